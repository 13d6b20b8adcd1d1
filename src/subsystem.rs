// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Collaborating subsystems.
//!
//! The message layer owns none of the router's long-lived state; the
//! network database, the transports, the tunnel registry and the
//! garlic router are reached through these interfaces. Implementations
//! run their own worker threads and expose thread-safe handles;
//! message ownership transfers on every `post`/`send` call.

use crate::{
    crypto::elgamal::PrivateKey,
    i2np::Message,
    primitives::{MessageId, RouterId, TunnelId},
    tunnel::transit::TransitTunnel,
};

use bytes::Bytes;

use alloc::{sync::Arc, vec::Vec};

/// Handle to the network database.
pub trait NetDbHandle: Send + Sync {
    /// Hand off a received `DatabaseStore`/`DatabaseSearchReply` for
    /// asynchronous processing.
    fn post_message(&self, message: Message);

    /// Get the serialized `RouterInfo` of `router_id`, if known.
    fn find_router(&self, router_id: &RouterId) -> Option<Bytes>;

    /// Get a random known router.
    fn random_router(&self) -> Option<RouterId>;

    /// Get the floodfill closest to `key`, ignoring `excluded`.
    fn closest_floodfill(&self, key: &[u8], excluded: &[RouterId]) -> Option<RouterId>;
}

/// Handle to the transport layer.
pub trait TransportService: Send + Sync {
    /// Send `message` to the router identified by `router_id`.
    fn send(&self, router_id: &RouterId, message: Message);
}

/// Handle to the garlic router.
pub trait GarlicHandler: Send + Sync {
    /// Introduce a one-time session key and tag so an encrypted reply
    /// can be decrypted.
    fn add_session_key(&self, key: [u8; 32], tag: [u8; 32]);

    /// Hand off a received garlic message.
    fn handle_garlic_message(&self, message: Message);

    /// Hand off a delivery status payload for tag confirmation.
    fn handle_delivery_status(&self, payload: &[u8]);
}

/// Tunnel whose build the local router originated and whose reply is
/// still outstanding.
pub trait PendingTunnel: Send + Sync {
    /// Get tunnel ID of the pending tunnel.
    fn tunnel_id(&self) -> TunnelId;

    /// Validate the build response records.
    ///
    /// Returns true if every hop accepted the tunnel.
    fn handle_build_response(&self, payload: &[u8]) -> bool;
}

/// Installed transit tunnel, reachable by its receive tunnel ID.
pub trait TransitTunnelSender: Send + Sync {
    /// Relay `message` through the transit tunnel.
    fn send_tunnel_data(&self, message: Message);
}

/// Established outbound tunnel.
pub trait OutboundTunnel: Send + Sync {
    /// Send `message` through the tunnel, addressed to the gateway
    /// tunnel of `gateway_router`.
    fn send_tunnel_data(&self, gateway_router: &RouterId, gateway_tunnel: TunnelId, message: Message);
}

/// Handle to the tunnel registry.
pub trait TunnelRegistry: Send + Sync {
    /// Get the pending tunnel whose build used `message_id`.
    fn pending_tunnel(&self, message_id: MessageId) -> Option<Arc<dyn PendingTunnel>>;

    /// Promote an accepted pending tunnel to an inbound tunnel.
    fn add_inbound_tunnel(&self, tunnel: Arc<dyn PendingTunnel>);

    /// Promote an accepted pending tunnel to an outbound tunnel.
    fn add_outbound_tunnel(&self, tunnel: Arc<dyn PendingTunnel>);

    /// Discard a declined pending tunnel.
    fn remove_pending_tunnel(&self, message_id: MessageId);

    /// Install a transit tunnel.
    fn add_transit_tunnel(&self, tunnel: TransitTunnel);

    /// Get the transit tunnel receiving on `tunnel_id`.
    fn transit_tunnel(&self, tunnel_id: TunnelId) -> Option<Arc<dyn TransitTunnelSender>>;

    /// Get the next outbound tunnel to send through.
    fn next_outbound_tunnel(&self) -> Option<Arc<dyn OutboundTunnel>>;

    /// Post a received tunnel data message to the tunnel data queue.
    fn post_tunnel_data(&self, message: Message);

    /// Route a delivery status to the pool of the inbound tunnel it
    /// arrived on.
    ///
    /// Returns the message back if the tunnel has no pool.
    fn post_pool_delivery_status(
        &self,
        tunnel_id: TunnelId,
        message: Message,
    ) -> Result<(), Message>;
}

/// Local router context.
///
/// Read-only for the message layer; the identity and keys change only
/// at startup and the router info through a separate publish cycle.
pub struct RouterContext {
    /// Identity hash of the local router.
    local_router_id: RouterId,

    /// Long-term ElGamal private key.
    private_key: PrivateKey,

    /// Serialized local `RouterInfo`.
    router_info: Bytes,
}

impl RouterContext {
    /// Create new [`RouterContext`].
    pub fn new(local_router_id: RouterId, private_key: PrivateKey, router_info: Vec<u8>) -> Self {
        Self {
            local_router_id,
            private_key,
            router_info: Bytes::from(router_info),
        }
    }

    /// Get identity hash of the local router.
    pub fn local_router_id(&self) -> &RouterId {
        &self.local_router_id
    }

    /// Get the local ElGamal private key.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Get the serialized local `RouterInfo`.
    pub fn router_info(&self) -> &Bytes {
        &self.router_info
    }
}
