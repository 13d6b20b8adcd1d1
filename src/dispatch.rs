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

//! Message builders and inbound dispatch.
//!
//! [`MessageDispatcher`] is the collaborator bundle of the message
//! layer: the router context, the handles to the network database,
//! transports, tunnel registry and garlic router, and the message ID
//! counter. It is called from transport receive threads and tunnel
//! worker threads; every failure is local, logged and dropped, nothing
//! propagates back to the transport layer.

use crate::{
    crypto::base64_encode,
    error::{Error, TunnelError},
    i2np::{
        database::{
            lookup::{DatabaseLookup, LookupReplyKind},
            search_reply::DatabaseSearchReply,
            store::DatabaseStore,
        },
        delivery_status::{DeliveryStatus, NETID_PROBE_TIMESTAMP},
        tunnel::data::{TunnelData, TUNNEL_DATA_LEN, TUNNEL_DATA_PAYLOAD_LEN},
        Message, MessageBuilder, MessageIdGenerator, MessageType,
    },
    primitives::{MessageId, RouterId, TunnelId},
    runtime::Runtime,
    subsystem::{GarlicHandler, NetDbHandle, RouterContext, TransportService, TunnelRegistry},
    tunnel::transit::TransitTunnelManager,
};

use rand_core::RngCore;

use alloc::{sync::Arc, vec, vec::Vec};

/// Logging target for the file.
const LOG_TARGET: &str = "nuncio::dispatch";

/// Message builders and inbound dispatch over the collaborator bundle.
pub struct MessageDispatcher<R: Runtime> {
    /// Local router context.
    context: Arc<RouterContext>,

    /// Network database.
    netdb: Arc<dyn NetDbHandle>,

    /// Transport layer.
    transports: Arc<dyn TransportService>,

    /// Tunnel registry.
    tunnels: Arc<dyn TunnelRegistry>,

    /// Garlic router.
    garlic: Arc<dyn GarlicHandler>,

    /// Message ID generator.
    message_id: Arc<MessageIdGenerator>,

    /// Transit tunnel manager.
    transit: TransitTunnelManager<R>,
}

impl<R: Runtime> MessageDispatcher<R> {
    /// Create new [`MessageDispatcher`].
    pub fn new(
        context: Arc<RouterContext>,
        netdb: Arc<dyn NetDbHandle>,
        transports: Arc<dyn TransportService>,
        tunnels: Arc<dyn TunnelRegistry>,
        garlic: Arc<dyn GarlicHandler>,
    ) -> Self {
        let message_id = Arc::new(MessageIdGenerator::new());
        let transit =
            TransitTunnelManager::new(context.clone(), tunnels.clone(), message_id.clone());

        Self {
            context,
            netdb,
            transports,
            tunnels,
            garlic,
            message_id,
            transit,
        }
    }

    /// Allocate a fresh message ID.
    pub fn next_message_id(&self) -> MessageId {
        self.message_id.next()
    }

    /// Create a `DeliveryStatus` message confirming `message_id`.
    ///
    /// A zero `message_id` creates a network ID probe used during
    /// transport establishment: a random message ID and the timestamp
    /// sentinel carrying the network ID.
    pub fn create_delivery_status(&self, message_id: u32) -> Message {
        let payload = match message_id {
            0 => DeliveryStatus {
                message_id: MessageId::from(R::rng().next_u32()),
                timestamp: NETID_PROBE_TIMESTAMP,
            },
            message_id => DeliveryStatus {
                message_id: MessageId::from(message_id),
                timestamp: R::time_since_epoch(),
            },
        }
        .serialize();

        MessageBuilder::new(MessageType::DeliveryStatus)
            .with_message_id(self.message_id.next())
            .with_payload(&payload)
            .build::<R>()
    }

    /// Create a `DatabaseLookup` for `key`.
    ///
    /// An exploratory lookup excludes floodfills by emitting a single
    /// all-zero excluded entry. Encryption requires a reply tunnel;
    /// without one the flag is silently cleared. When the reply is
    /// encrypted a fresh session key and tag are registered with the
    /// garlic router so the reply can be decrypted.
    pub fn create_database_lookup(
        &self,
        key: [u8; 32],
        from: RouterId,
        reply_tunnel: Option<TunnelId>,
        exploratory: bool,
        excluded: &[RouterId],
        encryption: bool,
    ) -> Message {
        let reply = match (reply_tunnel, encryption) {
            (Some(tunnel_id), true) => {
                let mut rng = R::rng();
                let mut session_key = [0u8; 32];
                let mut session_tag = [0u8; 32];
                rng.fill_bytes(&mut session_key);
                rng.fill_bytes(&mut session_tag);

                self.garlic.add_session_key(session_key, session_tag);

                LookupReplyKind::EncryptedTunnel {
                    tunnel_id,
                    session_key,
                    session_tag,
                }
            }
            (Some(tunnel_id), false) => LookupReplyKind::Tunnel { tunnel_id },
            // encryption is only possible for tunnel replies
            (None, _) => LookupReplyKind::Direct,
        };

        let excluded = match exploratory {
            // reply with non-floodfill routers only
            true => vec![RouterId::from([0u8; 32])],
            false => excluded.to_vec(),
        };

        let payload = DatabaseLookup {
            key,
            from,
            reply,
            excluded,
        }
        .serialize();

        MessageBuilder::new(MessageType::DatabaseLookup)
            .with_message_id(self.message_id.next())
            .with_payload(&payload)
            .build::<R>()
    }

    /// Create a `DatabaseSearchReply` for `key` with no peers.
    pub fn create_database_search_reply(&self, key: [u8; 32]) -> Message {
        let payload = DatabaseSearchReply {
            key,
            peers: Vec::new(),
            from: *self.context.local_router_id(),
        }
        .serialize();

        MessageBuilder::new(MessageType::DatabaseSearchReply)
            .with_message_id(self.message_id.next())
            .with_payload(&payload)
            .build::<R>()
    }

    /// Create a `DatabaseStore` publishing the local router info.
    ///
    /// Returns `None` if the router info fails to compress.
    pub fn create_database_store(&self) -> Option<Message> {
        let payload = DatabaseStore::<R>::serialize(
            self.context.local_router_id().as_bytes(),
            self.context.router_info(),
        )?;

        Some(
            MessageBuilder::new(MessageType::DatabaseStore)
                .with_message_id(self.message_id.next())
                .with_payload(&payload)
                .build::<R>(),
        )
    }

    /// Create a `TunnelData` message from a full tunnel data record.
    pub fn create_tunnel_data(&self, record: &[u8; TUNNEL_DATA_LEN]) -> Message {
        MessageBuilder::new(MessageType::TunnelData)
            .with_message_id(self.message_id.next())
            .with_payload(record)
            .build::<R>()
    }

    /// Create a `TunnelData` message for `tunnel_id` from the encrypted
    /// record contents.
    pub fn create_tunnel_data_to(
        &self,
        tunnel_id: TunnelId,
        payload: &[u8; TUNNEL_DATA_PAYLOAD_LEN],
    ) -> Message {
        let payload = TunnelData {
            tunnel_id,
            payload,
        }
        .serialize();

        MessageBuilder::new(MessageType::TunnelData)
            .with_message_id(self.message_id.next())
            .with_payload(&payload)
            .build::<R>()
    }

    /// Encapsulate `message` in a `TunnelGateway` for `tunnel_id`.
    pub fn create_tunnel_gateway(&self, tunnel_id: TunnelId, message: Message) -> Message {
        message.wrap_in_gateway::<R>(tunnel_id, self.message_id.next())
    }

    /// Handle a received message.
    ///
    /// Ownership of `message` transfers to the subsystem it is routed
    /// to; messages failing the checksum are dropped.
    pub fn handle_message(&self, message: Message) {
        if !message.verify_checksum() {
            tracing::warn!(
                target: LOG_TARGET,
                message_id = %message.message_id(),
                message_type = ?message.message_type(),
                "checksum mismatch, dropping message",
            );
            return;
        }

        match message.message_type() {
            MessageType::TunnelData => match TunnelData::parse(message.payload()) {
                Some(tunnel_data) => {
                    tracing::trace!(
                        target: LOG_TARGET,
                        tunnel_id = %tunnel_data.tunnel_id,
                        "tunnel data",
                    );

                    self.tunnels.post_tunnel_data(message);
                }
                None => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        message_id = %message.message_id(),
                        "malformed tunnel data, dropping",
                    );
                }
            },
            MessageType::TunnelGateway => self.handle_tunnel_gateway(message),
            MessageType::Garlic => self.garlic.handle_garlic_message(message),
            MessageType::DatabaseStore | MessageType::DatabaseSearchReply =>
                self.netdb.post_message(message),
            MessageType::DeliveryStatus => match message.from_tunnel() {
                Some(tunnel_id) =>
                    if let Err(message) =
                        self.tunnels.post_pool_delivery_status(tunnel_id, message)
                    {
                        self.garlic.handle_delivery_status(message.payload());
                    },
                None => self.garlic.handle_delivery_status(message.payload()),
            },
            _ => self.handle_raw(message),
        }
    }

    /// Handle a received message that hasn't been framed into an owned
    /// [`Message`] yet.
    pub fn handle_raw_message(&self, bytes: &[u8]) {
        let message = match Message::parse(bytes) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    ?error,
                    len = bytes.len(),
                    "failed to parse message, dropping",
                );
                return;
            }
        };

        if !message.verify_checksum() {
            tracing::warn!(
                target: LOG_TARGET,
                message_id = %message.message_id(),
                "checksum mismatch, dropping message",
            );
            return;
        }

        self.handle_raw(message);
    }

    /// Dispatch messages handled without an owned buffer.
    fn handle_raw(&self, message: Message) {
        match message.message_type() {
            MessageType::VariableTunnelBuild | MessageType::TunnelBuild =>
                self.handle_tunnel_build_request(message),
            MessageType::VariableTunnelBuildReply | MessageType::TunnelBuildReply =>
                self.handle_tunnel_build_reply(message),
            MessageType::DatabaseLookup => self.handle_database_lookup(message),
            message_type => {
                tracing::warn!(
                    target: LOG_TARGET,
                    ?message_type,
                    "unexpected message, dropping",
                );
            }
        }
    }

    /// Handle a `TunnelGateway` message.
    ///
    /// A transit `DatabaseStore` may contain a new or updated router
    /// info; a copy is posted to the network database while the
    /// original continues down the tunnel.
    fn handle_tunnel_gateway(&self, message: Message) {
        let (tunnel_id, inner) = match message.unwrap_gateway() {
            Ok(unwrapped) => unwrapped,
            Err(error) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    ?error,
                    "malformed tunnel gateway, dropping",
                );
                return;
            }
        };

        tracing::trace!(
            target: LOG_TARGET,
            %tunnel_id,
            message_type = ?inner.message_type(),
            len = inner.len(),
            "tunnel gateway",
        );

        if inner.message_type() == MessageType::DatabaseStore {
            self.netdb.post_message(inner.clone());
        }

        match self.tunnels.transit_tunnel(tunnel_id) {
            Some(tunnel) => tunnel.send_tunnel_data(inner),
            None => {
                tracing::warn!(
                    target: LOG_TARGET,
                    %tunnel_id,
                    "transit tunnel not found, dropping message",
                );
            }
        }
    }

    /// Handle a tunnel build request.
    ///
    /// A build whose message ID matches a pending tunnel is the reply
    /// for an inbound tunnel the local router originated; it is
    /// validated instead of being processed as a transit request.
    fn handle_tunnel_build_request(&self, message: Message) {
        match self.tunnels.pending_tunnel(message.message_id()) {
            Some(pending) => match pending.handle_build_response(message.payload()) {
                true => {
                    tracing::debug!(
                        target: LOG_TARGET,
                        tunnel_id = %pending.tunnel_id(),
                        "inbound tunnel created",
                    );
                    self.tunnels.add_inbound_tunnel(pending);
                }
                false => {
                    tracing::debug!(
                        target: LOG_TARGET,
                        tunnel_id = %pending.tunnel_id(),
                        "inbound tunnel declined",
                    );
                    self.tunnels.remove_pending_tunnel(message.message_id());
                }
            },
            None => {
                let result = match message.message_type() {
                    MessageType::VariableTunnelBuild =>
                        self.transit.handle_variable_tunnel_build(&message),
                    _ => self.transit.handle_tunnel_build(&message),
                };

                match result {
                    Ok((router, forwarded)) => self.transports.send(&router, forwarded),
                    // the build request wasn't meant for this router
                    Err(Error::Tunnel(TunnelError::RecordNotFound)) => {}
                    Err(error) => {
                        tracing::debug!(
                            target: LOG_TARGET,
                            ?error,
                            "failed to handle tunnel build request",
                        );
                    }
                }
            }
        }
    }

    /// Handle a tunnel build reply for an outbound tunnel.
    fn handle_tunnel_build_reply(&self, message: Message) {
        match self.tunnels.pending_tunnel(message.message_id()) {
            Some(pending) => match pending.handle_build_response(message.payload()) {
                true => {
                    tracing::debug!(
                        target: LOG_TARGET,
                        tunnel_id = %pending.tunnel_id(),
                        "outbound tunnel created",
                    );
                    self.tunnels.add_outbound_tunnel(pending);
                }
                false => {
                    tracing::debug!(
                        target: LOG_TARGET,
                        tunnel_id = %pending.tunnel_id(),
                        "outbound tunnel declined",
                    );
                    self.tunnels.remove_pending_tunnel(message.message_id());
                }
            },
            None => {
                tracing::warn!(
                    target: LOG_TARGET,
                    message_id = %message.message_id(),
                    "pending tunnel not found",
                );
            }
        }
    }

    /// Handle a `DatabaseLookup`.
    ///
    /// Lookups are answered with a "not found" search reply, sent
    /// through the next outbound tunnel when the requester asked for a
    /// tunnel reply and directly otherwise.
    fn handle_database_lookup(&self, message: Message) {
        let Some(lookup) = DatabaseLookup::parse(message.payload()) else {
            tracing::warn!(
                target: LOG_TARGET,
                message_id = %message.message_id(),
                "malformed database lookup, dropping",
            );
            return;
        };

        tracing::debug!(
            target: LOG_TARGET,
            key = %base64_encode(lookup.key),
            "database lookup received",
        );

        let reply = self.create_database_search_reply(lookup.key);

        match lookup.reply {
            LookupReplyKind::Tunnel { tunnel_id }
            | LookupReplyKind::EncryptedTunnel { tunnel_id, .. } =>
                match self.tunnels.next_outbound_tunnel() {
                    Some(outbound) => outbound.send_tunnel_data(&lookup.from, tunnel_id, reply),
                    None => {
                        tracing::warn!(
                            target: LOG_TARGET,
                            "no outbound tunnel for lookup reply, dropping",
                        );
                    }
                },
            LookupReplyKind::Direct => self.transports.send(&lookup.from, reply),
        }
    }
}
