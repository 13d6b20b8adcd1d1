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

//! I2NP message framing.
//!
//! https://geti2p.net/spec/i2np

use crate::{
    crypto::sha256::Sha256,
    error::MessageError,
    i2np::tunnel::gateway::TunnelGateway,
    primitives::{MessageId, TunnelId},
    runtime::Runtime,
};

use nom::{
    number::complete::{be_u16, be_u32, be_u64, be_u8},
    IResult,
};

use alloc::{vec, vec::Vec};
use core::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

pub mod database;
pub mod delivery_status;
pub mod tunnel;

/// I2NP message header length.
///
/// `type:u8 | msg_id:u32 | expiration:u64 | size:u16 | checksum:u8`
pub const I2NP_HEADER_LEN: usize = 16;

/// Tunnel gateway header length.
///
/// `tunnel_id:u32 | length:u16`
pub const TUNNEL_GATEWAY_HEADER_LEN: usize = 6;

/// Front pad reserved for NTCP framing.
const NTCP_RESERVED_LEN: usize = 2;

/// Front pad of builder-produced messages.
///
/// Large enough that one tunnel gateway header and one I2NP header can
/// be prepended in place, without reallocating the buffer.
pub const RESERVED_PREFIX_LEN: usize =
    NTCP_RESERVED_LEN + I2NP_HEADER_LEN + TUNNEL_GATEWAY_HEADER_LEN;

/// I2NP message expiration.
pub const I2NP_MESSAGE_EXPIRATION: Duration = Duration::from_secs(5);

/// AES-256 key length.
pub const AES256_KEY_LEN: usize = 32;

/// AES-256 IV length.
pub const AES256_IV_LEN: usize = 16;

/// Message ID offset in the I2NP header.
const MESSAGE_ID_OFFSET: usize = 1;

/// Expiration offset in the I2NP header.
const EXPIRATION_OFFSET: usize = 5;

/// Size offset in the I2NP header.
const SIZE_OFFSET: usize = 13;

/// Checksum offset in the I2NP header.
const CHECKSUM_OFFSET: usize = 15;

/// Message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    DatabaseStore,
    DatabaseLookup,
    DatabaseSearchReply,
    DeliveryStatus,
    Garlic,
    TunnelData,
    TunnelGateway,
    TunnelBuild,
    TunnelBuildReply,
    VariableTunnelBuild,
    VariableTunnelBuildReply,
}

impl MessageType {
    /// Serialize [`MessageType`].
    pub fn serialize(&self) -> u8 {
        match self {
            Self::DatabaseStore => 1,
            Self::DatabaseLookup => 2,
            Self::DatabaseSearchReply => 3,
            Self::DeliveryStatus => 10,
            Self::Garlic => 11,
            Self::TunnelData => 18,
            Self::TunnelGateway => 19,
            Self::TunnelBuild => 21,
            Self::TunnelBuildReply => 22,
            Self::VariableTunnelBuild => 23,
            Self::VariableTunnelBuildReply => 24,
        }
    }

    /// Try to convert `msg_type` into [`MessageType`].
    pub fn from_u8(msg_type: u8) -> Option<MessageType> {
        match msg_type {
            1 => Some(Self::DatabaseStore),
            2 => Some(Self::DatabaseLookup),
            3 => Some(Self::DatabaseSearchReply),
            10 => Some(Self::DeliveryStatus),
            11 => Some(Self::Garlic),
            18 => Some(Self::TunnelData),
            19 => Some(Self::TunnelGateway),
            21 => Some(Self::TunnelBuild),
            22 => Some(Self::TunnelBuildReply),
            23 => Some(Self::VariableTunnelBuild),
            24 => Some(Self::VariableTunnelBuildReply),
            _ => None,
        }
    }
}

/// Owned I2NP message.
///
/// The message owns its backing buffer; `offset` points at the start of
/// the I2NP header and `length` covers the header and the payload.
/// Builder-produced messages keep [`RESERVED_PREFIX_LEN`] bytes of front
/// pad so a tunnel gateway encapsulation can be prepended in place.
/// Ownership transfers to a collaborator on `send`/`post`; the inbound
/// tunnel back-reference is a non-owning [`TunnelId`], valid only while
/// the message is being dispatched.
#[derive(Clone, PartialEq)]
pub struct Message {
    /// Backing buffer.
    buffer: Vec<u8>,

    /// Start of the I2NP header within the buffer.
    offset: usize,

    /// Message length, header included.
    length: usize,

    /// Inbound tunnel the message arrived on.
    from: Option<TunnelId>,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("message_type", &self.message_type())
            .field("message_id", &self.message_id())
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

impl Default for Message {
    fn default() -> Self {
        let mut buffer = vec![0u8; RESERVED_PREFIX_LEN + I2NP_HEADER_LEN];
        buffer[RESERVED_PREFIX_LEN] = MessageType::DeliveryStatus.serialize();
        buffer[RESERVED_PREFIX_LEN + CHECKSUM_OFFSET] = Sha256::new().finalize()[0];

        Self {
            buffer,
            offset: RESERVED_PREFIX_LEN,
            length: I2NP_HEADER_LEN,
            from: None,
        }
    }
}

impl Message {
    /// Parse `input` into an owned [`Message`].
    ///
    /// `input` must contain exactly one message; the size field must
    /// agree with the input length. The checksum is not verified here,
    /// see [`Message::verify_checksum()`].
    pub fn parse(input: &[u8]) -> Result<Message, MessageError> {
        if input.len() < I2NP_HEADER_LEN {
            return Err(MessageError::TooShort);
        }

        let (_, (msg_type, _, _, size)) =
            Self::parse_header(input).map_err(|_| MessageError::TooShort)?;

        MessageType::from_u8(msg_type).ok_or(MessageError::UnknownMessageType(msg_type))?;

        if input.len() != I2NP_HEADER_LEN + size as usize {
            return Err(MessageError::LengthMismatch);
        }

        let mut buffer = vec![0u8; NTCP_RESERVED_LEN + input.len()];
        buffer[NTCP_RESERVED_LEN..].copy_from_slice(input);

        Ok(Message {
            buffer,
            offset: NTCP_RESERVED_LEN,
            length: input.len(),
            from: None,
        })
    }

    fn parse_header(input: &[u8]) -> IResult<&[u8], (u8, u32, u64, u16)> {
        let (rest, msg_type) = be_u8(input)?;
        let (rest, message_id) = be_u32(rest)?;
        let (rest, expiration) = be_u64(rest)?;
        let (rest, size) = be_u16(rest)?;
        let (rest, _checksum) = be_u8(rest)?;

        Ok((rest, (msg_type, message_id, expiration, size)))
    }

    fn header(&self) -> &[u8] {
        &self.buffer[self.offset..self.offset + I2NP_HEADER_LEN]
    }

    /// Get message type.
    pub fn message_type(&self) -> MessageType {
        MessageType::from_u8(self.header()[0]).expect("validated message type")
    }

    /// Get message ID.
    pub fn message_id(&self) -> MessageId {
        let bytes: [u8; 4] =
            self.header()[MESSAGE_ID_OFFSET..EXPIRATION_OFFSET].try_into().expect("to succeed");

        MessageId::from(u32::from_be_bytes(bytes))
    }

    /// Get expiration as duration since Unix epoch.
    pub fn expiration(&self) -> Duration {
        let bytes: [u8; 8] =
            self.header()[EXPIRATION_OFFSET..SIZE_OFFSET].try_into().expect("to succeed");

        Duration::from_millis(u64::from_be_bytes(bytes))
    }

    /// Get reference to message payload.
    pub fn payload(&self) -> &[u8] {
        &self.buffer[self.offset + I2NP_HEADER_LEN..self.offset + self.length]
    }

    /// Get mutable reference to message payload.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[self.offset + I2NP_HEADER_LEN..self.offset + self.length]
    }

    /// Get the full serialized message, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[self.offset..self.offset + self.length]
    }

    /// Get message length, header included.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true if the message carries no payload.
    pub fn is_empty(&self) -> bool {
        self.length == I2NP_HEADER_LEN
    }

    /// Get the inbound tunnel the message arrived on.
    pub fn from_tunnel(&self) -> Option<TunnelId> {
        self.from
    }

    /// Record the inbound tunnel the message arrived on.
    pub fn set_from_tunnel(&mut self, tunnel_id: TunnelId) {
        self.from = Some(tunnel_id);
    }

    /// Verify that the first byte of the payload digest matches the
    /// header checksum byte.
    pub fn verify_checksum(&self) -> bool {
        Sha256::new().update(self.payload()).finalize()[0] == self.header()[CHECKSUM_OFFSET]
    }

    /// Assign a fresh message ID and expiration.
    ///
    /// The checksum is left untouched: the payload doesn't change and
    /// the stored checksum byte remains valid.
    pub fn renew_header<R: Runtime>(&mut self, message_id: MessageId) {
        let expiration = (R::time_since_epoch() + I2NP_MESSAGE_EXPIRATION).as_millis() as u64;
        let header = &mut self.buffer[self.offset..self.offset + I2NP_HEADER_LEN];

        header[MESSAGE_ID_OFFSET..EXPIRATION_OFFSET].copy_from_slice(&(*message_id).to_be_bytes());
        header[EXPIRATION_OFFSET..SIZE_OFFSET].copy_from_slice(&expiration.to_be_bytes());
    }

    /// Encapsulate the message in a `TunnelGateway` message for
    /// `tunnel_id`.
    ///
    /// If the front pad is large enough for a tunnel gateway header and
    /// another I2NP header, both are prepended in place and the payload
    /// bytes are not moved; otherwise the message is copied into a
    /// freshly allocated one.
    pub fn wrap_in_gateway<R: Runtime>(
        mut self,
        tunnel_id: TunnelId,
        message_id: MessageId,
    ) -> Message {
        if self.offset >= I2NP_HEADER_LEN + TUNNEL_GATEWAY_HEADER_LEN {
            let inner_len = self.length;
            let gateway_offset = self.offset - TUNNEL_GATEWAY_HEADER_LEN;

            TunnelGateway::write_header(
                &mut self.buffer[gateway_offset..self.offset],
                tunnel_id,
                inner_len as u16,
            );

            self.offset -= I2NP_HEADER_LEN + TUNNEL_GATEWAY_HEADER_LEN;
            self.length += I2NP_HEADER_LEN + TUNNEL_GATEWAY_HEADER_LEN;

            let expiration = (R::time_since_epoch() + I2NP_MESSAGE_EXPIRATION).as_millis() as u64;
            let size = (TUNNEL_GATEWAY_HEADER_LEN + inner_len) as u16;
            let checksum = Sha256::new()
                .update(&self.buffer[self.offset + I2NP_HEADER_LEN..self.offset + self.length])
                .finalize()[0];

            let header = &mut self.buffer[self.offset..self.offset + I2NP_HEADER_LEN];
            header[0] = MessageType::TunnelGateway.serialize();
            header[MESSAGE_ID_OFFSET..EXPIRATION_OFFSET]
                .copy_from_slice(&(*message_id).to_be_bytes());
            header[EXPIRATION_OFFSET..SIZE_OFFSET].copy_from_slice(&expiration.to_be_bytes());
            header[SIZE_OFFSET..CHECKSUM_OFFSET].copy_from_slice(&size.to_be_bytes());
            header[CHECKSUM_OFFSET] = checksum;

            self
        } else {
            let payload = TunnelGateway {
                tunnel_id,
                payload: self.as_bytes(),
            }
            .serialize();

            MessageBuilder::new(MessageType::TunnelGateway)
                .with_message_id(message_id)
                .with_payload(&payload)
                .build::<R>()
        }
    }

    /// Strip the tunnel gateway encapsulation and return the gateway
    /// tunnel ID together with the carried message.
    ///
    /// The buffer is not copied; the returned message is a view into the
    /// same allocation with its offset advanced past both headers.
    pub fn unwrap_gateway(mut self) -> Result<(TunnelId, Message), MessageError> {
        let payload = self.payload();
        if payload.len() < TUNNEL_GATEWAY_HEADER_LEN {
            return Err(MessageError::TooShort);
        }

        let gateway = TunnelGateway::parse(payload).ok_or(MessageError::LengthMismatch)?;
        let tunnel_id = gateway.tunnel_id;
        let inner = gateway.payload;
        let inner_len = inner.len();

        if inner.len() < I2NP_HEADER_LEN {
            return Err(MessageError::TooShort);
        }

        let (_, (msg_type, _, _, size)) =
            Self::parse_header(inner).map_err(|_| MessageError::TooShort)?;
        MessageType::from_u8(msg_type).ok_or(MessageError::UnknownMessageType(msg_type))?;

        if inner.len() != I2NP_HEADER_LEN + size as usize {
            return Err(MessageError::LengthMismatch);
        }

        self.offset += I2NP_HEADER_LEN + TUNNEL_GATEWAY_HEADER_LEN;
        self.length = inner_len;

        Ok((tunnel_id, self))
    }
}

/// Builder for I2NP messages.
///
/// Produces a header-valid [`Message`] with the front pad reserved: the
/// expiration defaults to now + [`I2NP_MESSAGE_EXPIRATION`] and the
/// checksum byte is the first byte of the payload digest.
pub struct MessageBuilder<'a> {
    /// Message type.
    message_type: MessageType,

    /// Message ID.
    message_id: MessageId,

    /// Expiration, as duration since Unix epoch.
    expiration: Option<Duration>,

    /// Payload.
    payload: &'a [u8],
}

impl<'a> MessageBuilder<'a> {
    /// Create new [`MessageBuilder`] for `message_type`.
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            message_id: MessageId::from(0u32),
            expiration: None,
            payload: &[],
        }
    }

    /// Specify message ID.
    pub fn with_message_id(mut self, message_id: impl Into<MessageId>) -> Self {
        self.message_id = message_id.into();
        self
    }

    /// Specify expiration.
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Specify payload.
    pub fn with_payload(mut self, payload: &'a [u8]) -> Self {
        self.payload = payload;
        self
    }

    /// Build [`Message`].
    pub fn build<R: Runtime>(self) -> Message {
        let expiration = self
            .expiration
            .unwrap_or_else(|| R::time_since_epoch() + I2NP_MESSAGE_EXPIRATION)
            .as_millis() as u64;

        let mut buffer = vec![0u8; RESERVED_PREFIX_LEN + I2NP_HEADER_LEN + self.payload.len()];
        let header = &mut buffer[RESERVED_PREFIX_LEN..];

        header[0] = self.message_type.serialize();
        header[MESSAGE_ID_OFFSET..EXPIRATION_OFFSET]
            .copy_from_slice(&(*self.message_id).to_be_bytes());
        header[EXPIRATION_OFFSET..SIZE_OFFSET].copy_from_slice(&expiration.to_be_bytes());
        header[SIZE_OFFSET..CHECKSUM_OFFSET]
            .copy_from_slice(&(self.payload.len() as u16).to_be_bytes());
        header[CHECKSUM_OFFSET] = Sha256::new().update(self.payload).finalize()[0];
        header[I2NP_HEADER_LEN..].copy_from_slice(self.payload);

        Message {
            buffer,
            offset: RESERVED_PREFIX_LEN,
            length: I2NP_HEADER_LEN + self.payload.len(),
            from: None,
        }
    }
}

/// Message ID generator.
///
/// Lock-free, wraps naturally.
pub struct MessageIdGenerator(AtomicU32);

impl MessageIdGenerator {
    /// Create new [`MessageIdGenerator`].
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Allocate the next message ID.
    pub fn next(&self) -> MessageId {
        MessageId::from(self.0.fetch_add(1, Ordering::Relaxed))
    }
}
