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

//! Transit tunnel handling.
//!
//! Processes tunnel build requests for hops the local router
//! participates in: the local record is identified by the truncated
//! identity hash, decrypted with the long-term ElGamal key, a transit
//! tunnel is installed and the record slot is replaced with an accept
//! response. Every record of the message is then re-encrypted with
//! AES-256-CBC under the reply key and IV, key and IV re-set before
//! each record, so earlier hops observe the transformed ciphertext the
//! protocol prescribes.

use crate::{
    crypto::aes::cbc::Aes,
    error::{Error, TunnelError},
    i2np::{
        tunnel::build::{
            BuildResponseRecord, HopRole, TunnelBuildRecord, NUM_TUNNEL_BUILD_RECORDS,
            TUNNEL_BUILD_ACCEPT, TUNNEL_BUILD_RECORD_LEN,
        },
        Message, MessageBuilder, MessageIdGenerator, MessageType,
    },
    primitives::{RouterId, TunnelId, TRUNCATED_HASH_LEN},
    runtime::Runtime,
    subsystem::{RouterContext, TunnelRegistry},
};

use alloc::{sync::Arc, vec::Vec};
use core::marker::PhantomData;

/// Logging target for the file.
const LOG_TARGET: &str = "nuncio::tunnel::transit";

/// State of an installed transit tunnel.
///
/// Handed to the tunnel registry which owns relaying; the message
/// layer only installs the tunnel and later looks it up by its
/// receive tunnel ID.
#[derive(Debug, Clone)]
pub struct TransitTunnel {
    /// Tunnel ID the hop receives messages on.
    pub tunnel_id: TunnelId,

    /// Identity hash of the next hop.
    pub next_router: RouterId,

    /// Tunnel ID of the next hop.
    pub next_tunnel_id: TunnelId,

    /// Tunnel layer key.
    pub layer_key: [u8; 32],

    /// Tunnel IV key.
    pub iv_key: [u8; 32],

    /// Role of the local hop.
    pub role: HopRole,
}

/// Transit tunnel manager.
///
/// Stateless over the collaborator bundle; called for every received
/// `TunnelBuild`/`VariableTunnelBuild` that isn't a reply to a build
/// the local router originated.
pub struct TransitTunnelManager<R: Runtime> {
    /// Local router context.
    context: Arc<RouterContext>,

    /// Tunnel registry.
    tunnels: Arc<dyn TunnelRegistry>,

    /// Message ID generator.
    message_id: Arc<MessageIdGenerator>,

    /// Marker for `Runtime`.
    _runtime: PhantomData<R>,
}

impl<R: Runtime> TransitTunnelManager<R> {
    /// Create new [`TransitTunnelManager`].
    pub fn new(
        context: Arc<RouterContext>,
        tunnels: Arc<dyn TunnelRegistry>,
        message_id: Arc<MessageIdGenerator>,
    ) -> Self {
        Self {
            context,
            tunnels,
            message_id,
            _runtime: PhantomData,
        }
    }

    /// Return mutable reference to the local build record and its index
    /// in the record array.
    fn find_local_record<'a>(&self, records: &'a mut [u8]) -> Option<(usize, &'a mut [u8])> {
        records
            .chunks_mut(TUNNEL_BUILD_RECORD_LEN)
            .enumerate()
            .find(|(_, chunk)| {
                chunk[..TRUNCATED_HASH_LEN] == self.context.local_router_id().truncated()[..]
            })
    }

    /// Process the record array of a build request.
    ///
    /// Decrypts the local record, installs a transit tunnel, replaces
    /// the record slot with an accept response and re-encrypts every
    /// record with the reply key and IV.
    fn handle_build_records(&self, records: &mut [u8]) -> crate::Result<TunnelBuildRecord> {
        let Some((record_idx, record)) = self.find_local_record(records) else {
            return Err(Error::Tunnel(TunnelError::RecordNotFound));
        };

        let decrypted = self
            .context
            .private_key()
            .decrypt(&record[TRUNCATED_HASH_LEN..])
            .ok_or_else(|| {
                tracing::warn!(
                    target: LOG_TARGET,
                    record = record_idx,
                    "failed to decrypt build record",
                );

                Error::ElGamal
            })?;

        let build_record = TunnelBuildRecord::parse(&decrypted).ok_or_else(|| {
            tracing::warn!(
                target: LOG_TARGET,
                record = record_idx,
                "malformed build record",
            );

            Error::Tunnel(TunnelError::InvalidRecord)
        })?;

        tracing::debug!(
            target: LOG_TARGET,
            record = record_idx,
            role = ?build_record.role(),
            tunnel_id = %build_record.receive_tunnel(),
            next_tunnel_id = %build_record.next_tunnel(),
            next_router = %build_record.next_router(),
            "local build record found",
        );

        self.tunnels.add_transit_tunnel(TransitTunnel {
            tunnel_id: build_record.receive_tunnel(),
            next_router: *build_record.next_router(),
            next_tunnel_id: build_record.next_tunnel(),
            layer_key: *build_record.layer_key(),
            iv_key: *build_record.iv_key(),
            role: build_record.role(),
        });

        BuildResponseRecord::write(record, TUNNEL_BUILD_ACCEPT);

        // each record is encrypted independently, key and iv re-set
        // before every record
        for record in records.chunks_mut(TUNNEL_BUILD_RECORD_LEN) {
            let encrypted = Aes::new_encryptor(build_record.reply_key(), build_record.reply_iv())
                .encrypt(&record);
            record.copy_from_slice(&encrypted);
        }

        Ok(build_record)
    }

    /// Construct the message forwarded to the next hop.
    ///
    /// Intermediate hops forward the build request as-is; the outbound
    /// endpoint sends the build reply back through the reply tunnel,
    /// wrapped in a `TunnelGateway`.
    fn forward_build_message(
        &self,
        build_record: TunnelBuildRecord,
        payload: Vec<u8>,
        build_type: MessageType,
        reply_type: MessageType,
    ) -> (RouterId, Message) {
        match build_record.role() {
            HopRole::OutboundEndpoint => {
                let reply = MessageBuilder::new(reply_type)
                    .with_message_id(build_record.next_message_id())
                    .with_payload(&payload)
                    .build::<R>();

                (
                    *build_record.next_router(),
                    reply.wrap_in_gateway::<R>(build_record.next_tunnel(), self.message_id.next()),
                )
            }
            _ => (
                *build_record.next_router(),
                MessageBuilder::new(build_type)
                    .with_message_id(build_record.next_message_id())
                    .with_payload(&payload)
                    .build::<R>(),
            ),
        }
    }

    /// Handle variable tunnel build request.
    ///
    /// Returns the next hop and the message to forward to it.
    pub fn handle_variable_tunnel_build(
        &self,
        message: &Message,
    ) -> crate::Result<(RouterId, Message)> {
        let payload = message.payload();
        let num_records = *payload.first().ok_or(Error::InvalidData)? as usize;

        if payload.len() != 1 + num_records * TUNNEL_BUILD_RECORD_LEN {
            tracing::warn!(
                target: LOG_TARGET,
                message_id = %message.message_id(),
                ?num_records,
                payload_len = payload.len(),
                "malformed variable tunnel build request",
            );

            return Err(Error::InvalidData);
        }

        let mut payload = payload.to_vec();
        let build_record = self.handle_build_records(&mut payload[1..])?;

        Ok(self.forward_build_message(
            build_record,
            payload,
            MessageType::VariableTunnelBuild,
            MessageType::VariableTunnelBuildReply,
        ))
    }

    /// Handle fixed tunnel build request, always
    /// [`NUM_TUNNEL_BUILD_RECORDS`] records without a count prefix.
    ///
    /// Returns the next hop and the message to forward to it.
    pub fn handle_tunnel_build(&self, message: &Message) -> crate::Result<(RouterId, Message)> {
        let payload = message.payload();

        if payload.len() != NUM_TUNNEL_BUILD_RECORDS * TUNNEL_BUILD_RECORD_LEN {
            tracing::warn!(
                target: LOG_TARGET,
                message_id = %message.message_id(),
                payload_len = payload.len(),
                "malformed tunnel build request",
            );

            return Err(Error::InvalidData);
        }

        let mut payload = payload.to_vec();
        let build_record = self.handle_build_records(&mut payload)?;

        Ok(self.forward_build_message(
            build_record,
            payload,
            MessageType::TunnelBuild,
            MessageType::TunnelBuildReply,
        ))
    }
}
