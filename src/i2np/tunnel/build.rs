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

//! Tunnel build records.
//!
//! A build request record is the ElGamal ciphertext of a 222-byte
//! cleartext record, addressed with the truncated identity hash of the
//! hop it is meant for. Once a hop has processed its own record it
//! overwrites the slot with a response record; every record of the
//! message is then encrypted with AES-256-CBC under the reply key and
//! IV of the processed record.

use crate::{
    crypto::{
        elgamal::{PublicKey, ELGAMAL_CIPHERTEXT_LEN},
        sha256::Sha256,
    },
    primitives::{MessageId, RouterId, TunnelId, ROUTER_HASH_LEN, TRUNCATED_HASH_LEN},
    runtime::Runtime,
};

use nom::{
    bytes::complete::take,
    error::{make_error, ErrorKind},
    number::complete::{be_u32, be_u8},
    Err, IResult,
};
use rand_core::{CryptoRng, RngCore};

/// Length of one build record on the wire.
pub const TUNNEL_BUILD_RECORD_LEN: usize = TRUNCATED_HASH_LEN + ELGAMAL_CIPHERTEXT_LEN;

/// Length of the cleartext build request record.
pub const BUILD_REQUEST_RECORD_LEN: usize = 222;

/// Number of records in a fixed `TunnelBuild` message.
pub const NUM_TUNNEL_BUILD_RECORDS: usize = 8;

/// Reply byte of an accepted build request.
pub const TUNNEL_BUILD_ACCEPT: u8 = 0;

/// Padding length of a build response record.
const BUILD_RESPONSE_PADDING_LEN: usize = 495;

/// Cleartext padding length.
const BUILD_REQUEST_PADDING_LEN: usize = 29;

/// Hop role, encoded in the flag byte of the request record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopRole {
    /// Router acts as the inbound gateway.
    InboundGateway,

    /// Router acts as the outbound endpoint.
    OutboundEndpoint,

    /// Router acts as an intermediary participant.
    Participant,
}

impl HopRole {
    /// Try to convert `role` into [`HopRole`].
    pub fn from_u8(role: u8) -> Option<HopRole> {
        match role {
            0x80 => Some(HopRole::InboundGateway),
            0x40 => Some(HopRole::OutboundEndpoint),
            0x00 => Some(HopRole::Participant),
            _ => None,
        }
    }

    /// Serialize [`HopRole`].
    pub fn as_u8(&self) -> u8 {
        match self {
            HopRole::InboundGateway => 0x80,
            HopRole::OutboundEndpoint => 0x40,
            HopRole::Participant => 0x00,
        }
    }
}

/// Cleartext tunnel build request record.
#[derive(Debug)]
pub struct TunnelBuildRecord {
    /// Tunnel ID the hop shall receive messages on.
    receive_tunnel: TunnelId,

    /// Identity hash of the hop.
    our_ident: RouterId,

    /// Tunnel ID of the next hop.
    next_tunnel: TunnelId,

    /// Identity hash of the next hop.
    next_router: RouterId,

    /// Tunnel layer key (AES-256).
    layer_key: [u8; 32],

    /// Tunnel IV key (AES-256).
    iv_key: [u8; 32],

    /// Reply key (AES-256).
    reply_key: [u8; 32],

    /// Reply IV.
    reply_iv: [u8; 16],

    /// Hop role.
    role: HopRole,

    /// Request time, in hours since Unix epoch.
    request_time: u32,

    /// Next message ID.
    ///
    /// Used as the message ID of the forwarded build message or of the
    /// build reply.
    next_message_id: MessageId,
}

impl TunnelBuildRecord {
    /// Create new [`TunnelBuildRecord`] for a hop.
    pub fn new<R: Runtime>(
        receive_tunnel: TunnelId,
        our_ident: RouterId,
        next_tunnel: TunnelId,
        next_router: RouterId,
        layer_key: [u8; 32],
        iv_key: [u8; 32],
        reply_key: [u8; 32],
        reply_iv: [u8; 16],
        role: HopRole,
        next_message_id: MessageId,
    ) -> Self {
        Self {
            receive_tunnel,
            our_ident,
            next_tunnel,
            next_router,
            layer_key,
            iv_key,
            reply_key,
            reply_iv,
            role,
            request_time: (R::time_since_epoch().as_secs() / 3600) as u32,
            next_message_id,
        }
    }

    /// Attempt to parse [`TunnelBuildRecord`] from `input`.
    ///
    /// Returns the parsed record and rest of `input` on success.
    pub fn parse_frame(input: &[u8]) -> IResult<&[u8], Self> {
        let (rest, receive_tunnel) = be_u32(input)?;
        let (rest, our_ident) = take(ROUTER_HASH_LEN)(rest)?;
        let (rest, next_tunnel) = be_u32(rest)?;
        let (rest, next_router) = take(ROUTER_HASH_LEN)(rest)?;
        let (rest, layer_key) = take(32usize)(rest)?;
        let (rest, iv_key) = take(32usize)(rest)?;
        let (rest, reply_key) = take(32usize)(rest)?;
        let (rest, reply_iv) = take(16usize)(rest)?;
        let (rest, flag) = be_u8(rest)?;
        let (rest, request_time) = be_u32(rest)?;
        let (rest, next_message_id) = be_u32(rest)?;
        let (rest, _padding) = take(BUILD_REQUEST_PADDING_LEN)(rest)?;
        let role = HopRole::from_u8(flag).ok_or(Err::Error(make_error(input, ErrorKind::Fail)))?;

        Ok((
            rest,
            TunnelBuildRecord {
                receive_tunnel: TunnelId::from(receive_tunnel),
                our_ident: RouterId::try_from(our_ident).expect("valid hash length"),
                next_tunnel: TunnelId::from(next_tunnel),
                next_router: RouterId::try_from(next_router).expect("valid hash length"),
                layer_key: layer_key.try_into().expect("valid key length"),
                iv_key: iv_key.try_into().expect("valid key length"),
                reply_key: reply_key.try_into().expect("valid key length"),
                reply_iv: reply_iv.try_into().expect("valid iv length"),
                role,
                request_time,
                next_message_id: MessageId::from(next_message_id),
            },
        ))
    }

    /// Attempt to parse `input` into [`TunnelBuildRecord`].
    pub fn parse(input: &[u8]) -> Option<Self> {
        Some(Self::parse_frame(input).ok()?.1)
    }

    /// Serialize [`TunnelBuildRecord`] into a cleartext record with
    /// random padding.
    pub fn serialize(
        self,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> [u8; BUILD_REQUEST_RECORD_LEN] {
        let mut out = [0u8; BUILD_REQUEST_RECORD_LEN];

        out[..4].copy_from_slice(&(*self.receive_tunnel).to_be_bytes());
        out[4..36].copy_from_slice(self.our_ident.as_bytes());
        out[36..40].copy_from_slice(&(*self.next_tunnel).to_be_bytes());
        out[40..72].copy_from_slice(self.next_router.as_bytes());
        out[72..104].copy_from_slice(&self.layer_key);
        out[104..136].copy_from_slice(&self.iv_key);
        out[136..168].copy_from_slice(&self.reply_key);
        out[168..184].copy_from_slice(&self.reply_iv);
        out[184] = self.role.as_u8();
        out[185..189].copy_from_slice(&self.request_time.to_be_bytes());
        out[189..193].copy_from_slice(&(*self.next_message_id).to_be_bytes());
        rng.fill_bytes(&mut out[193..]);

        out
    }

    /// Serialize and encrypt the record for the hop identified by
    /// `to_peer`, producing one wire record.
    pub fn encrypt(
        self,
        public_key: &PublicKey,
        to_peer: &RouterId,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> [u8; TUNNEL_BUILD_RECORD_LEN] {
        let mut out = [0u8; TUNNEL_BUILD_RECORD_LEN];
        out[..TRUNCATED_HASH_LEN].copy_from_slice(to_peer.truncated());

        let cleartext = self.serialize(rng);
        out[TRUNCATED_HASH_LEN..].copy_from_slice(&public_key.encrypt(&cleartext, rng));

        out
    }

    /// Get tunnel ID the hop receives messages on.
    pub fn receive_tunnel(&self) -> TunnelId {
        self.receive_tunnel
    }

    /// Get identity hash of the hop.
    pub fn our_ident(&self) -> &RouterId {
        &self.our_ident
    }

    /// Get tunnel ID of the next hop.
    pub fn next_tunnel(&self) -> TunnelId {
        self.next_tunnel
    }

    /// Get identity hash of the next hop.
    pub fn next_router(&self) -> &RouterId {
        &self.next_router
    }

    /// Get tunnel layer key.
    pub fn layer_key(&self) -> &[u8; 32] {
        &self.layer_key
    }

    /// Get tunnel IV key.
    pub fn iv_key(&self) -> &[u8; 32] {
        &self.iv_key
    }

    /// Get reply key.
    pub fn reply_key(&self) -> &[u8; 32] {
        &self.reply_key
    }

    /// Get reply IV.
    pub fn reply_iv(&self) -> &[u8; 16] {
        &self.reply_iv
    }

    /// Get hop role.
    pub fn role(&self) -> HopRole {
        self.role
    }

    /// Get request time, in hours since Unix epoch.
    pub fn request_time(&self) -> u32 {
        self.request_time
    }

    /// Get next message ID.
    pub fn next_message_id(&self) -> MessageId {
        self.next_message_id
    }
}

/// Tunnel build response record.
///
/// Occupies the same 528-byte slot as the request record it answers:
/// the SHA-256 digest of the trailing 496 bytes, 495 bytes of padding
/// and the reply byte.
pub struct BuildResponseRecord;

impl BuildResponseRecord {
    /// Overwrite `record` with a response record carrying `reply`.
    ///
    /// Panics if `record` is not a full build record slot.
    pub fn write(record: &mut [u8], reply: u8) {
        assert_eq!(record.len(), TUNNEL_BUILD_RECORD_LEN, "invalid record slot");

        record[32..32 + BUILD_RESPONSE_PADDING_LEN].fill(0u8);
        record[TUNNEL_BUILD_RECORD_LEN - 1] = reply;

        let hash = Sha256::new().update(&record[32..]).finalize();
        record[..32].copy_from_slice(&hash);
    }

    /// Validate the digest of a decrypted response record and return
    /// the reply byte.
    pub fn validate(record: &[u8]) -> Option<u8> {
        if record.len() != TUNNEL_BUILD_RECORD_LEN {
            return None;
        }

        let hash = Sha256::new().update(&record[32..]).finalize();
        (hash == record[..32]).then(|| record[TUNNEL_BUILD_RECORD_LEN - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crypto::elgamal::KeyPairGenerator,
        runtime::{mock::MockRuntime, Runtime},
    };

    #[test]
    fn serialize_deserialize() {
        MockRuntime::set_time_since_epoch(core::time::Duration::from_secs(3600 * 473000));
        let mut rng = MockRuntime::rng();

        let serialized = TunnelBuildRecord::new::<MockRuntime>(
            TunnelId::from(1337u32),
            RouterId::from([0x11; 32]),
            TunnelId::from(1338u32),
            RouterId::from([0x22; 32]),
            [0x33; 32],
            [0x44; 32],
            [0x55; 32],
            [0x66; 16],
            HopRole::Participant,
            MessageId::from(13371338u32),
        )
        .serialize(&mut rng);

        assert_eq!(serialized.len(), BUILD_REQUEST_RECORD_LEN);

        let record = TunnelBuildRecord::parse(&serialized).unwrap();
        assert_eq!(record.receive_tunnel(), TunnelId::from(1337u32));
        assert_eq!(record.our_ident(), &RouterId::from([0x11; 32]));
        assert_eq!(record.next_tunnel(), TunnelId::from(1338u32));
        assert_eq!(record.next_router(), &RouterId::from([0x22; 32]));
        assert_eq!(record.layer_key(), &[0x33; 32]);
        assert_eq!(record.iv_key(), &[0x44; 32]);
        assert_eq!(record.reply_key(), &[0x55; 32]);
        assert_eq!(record.reply_iv(), &[0x66; 16]);
        assert_eq!(record.role(), HopRole::Participant);
        assert_eq!(record.request_time(), 473000u32);
        assert_eq!(record.next_message_id(), MessageId::from(13371338u32));
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let mut rng = MockRuntime::rng();

        let mut serialized = TunnelBuildRecord::new::<MockRuntime>(
            TunnelId::from(1u32),
            RouterId::from([0x11; 32]),
            TunnelId::from(2u32),
            RouterId::from([0x22; 32]),
            [0x33; 32],
            [0x44; 32],
            [0x55; 32],
            [0x66; 16],
            HopRole::InboundGateway,
            MessageId::from(3u32),
        )
        .serialize(&mut rng);
        serialized[184] = 0xff;

        assert!(TunnelBuildRecord::parse(&serialized).is_none());
    }

    #[test]
    fn encrypted_record_is_addressed_and_decryptable() {
        let mut rng = MockRuntime::rng();
        let (private_key, public_key) = KeyPairGenerator::generate(&mut rng);
        let to_peer = RouterId::from([0x77; 32]);

        let encrypted = TunnelBuildRecord::new::<MockRuntime>(
            TunnelId::from(1u32),
            to_peer,
            TunnelId::from(2u32),
            RouterId::from([0x88; 32]),
            [0x33; 32],
            [0x44; 32],
            [0x55; 32],
            [0x66; 16],
            HopRole::OutboundEndpoint,
            MessageId::from(3u32),
        )
        .encrypt(&public_key, &to_peer, &mut rng);

        assert_eq!(&encrypted[..TRUNCATED_HASH_LEN], to_peer.truncated());

        let decrypted = private_key.decrypt(&encrypted[TRUNCATED_HASH_LEN..]).unwrap();
        let record = TunnelBuildRecord::parse(&decrypted).unwrap();
        assert_eq!(record.role(), HopRole::OutboundEndpoint);
        assert_eq!(record.next_router(), &RouterId::from([0x88; 32]));
    }

    #[test]
    fn response_record_roundtrip() {
        let mut record = [0xaa; TUNNEL_BUILD_RECORD_LEN];
        BuildResponseRecord::write(&mut record, TUNNEL_BUILD_ACCEPT);

        assert_eq!(
            BuildResponseRecord::validate(&record),
            Some(TUNNEL_BUILD_ACCEPT)
        );

        // tampering with the padding invalidates the digest
        record[100] ^= 0xff;
        assert!(BuildResponseRecord::validate(&record).is_none());
    }
}
