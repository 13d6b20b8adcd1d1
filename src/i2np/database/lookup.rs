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

use crate::{
    i2np::database::DATABASE_KEY_LEN,
    primitives::{RouterId, TunnelId, ROUTER_HASH_LEN},
};

use bytes::{BufMut, BytesMut};
use nom::{
    bytes::complete::take,
    error::{make_error, ErrorKind},
    number::complete::{be_u16, be_u32, be_u8},
    Err, IResult,
};

use alloc::vec::Vec;

/// Reply is requested through a tunnel.
const FLAG_REPLY_VIA_TUNNEL: u8 = 0x01;

/// Reply must be garlic-encrypted.
const FLAG_REPLY_ENCRYPTED: u8 = 0x02;

/// How the lookup reply should be delivered.
pub enum LookupReplyKind {
    /// Reply directly to the requesting router.
    Direct,

    /// Reply through the gateway of the given tunnel.
    Tunnel {
        /// Reply tunnel ID.
        tunnel_id: TunnelId,
    },

    /// Reply through a tunnel, garlic-encrypted with a one-time session
    /// key and tag.
    EncryptedTunnel {
        /// Reply tunnel ID.
        tunnel_id: TunnelId,

        /// One-time session key.
        session_key: [u8; 32],

        /// One-time session tag.
        session_tag: [u8; 32],
    },
}

impl LookupReplyKind {
    fn flag(&self) -> u8 {
        match self {
            Self::Direct => 0x00,
            Self::Tunnel { .. } => FLAG_REPLY_VIA_TUNNEL,
            Self::EncryptedTunnel { .. } => FLAG_REPLY_VIA_TUNNEL | FLAG_REPLY_ENCRYPTED,
        }
    }
}

/// Database lookup.
pub struct DatabaseLookup {
    /// Key to look up.
    pub key: [u8; DATABASE_KEY_LEN],

    /// Identity hash of the requesting router, or of the reply tunnel's
    /// gateway when the reply travels through a tunnel.
    pub from: RouterId,

    /// Reply delivery.
    pub reply: LookupReplyKind,

    /// Peers to exclude from the reply.
    pub excluded: Vec<RouterId>,
}

impl DatabaseLookup {
    /// Attempt to parse [`DatabaseLookup`] from `input`.
    ///
    /// Returns the parsed message and rest of `input` on success.
    ///
    /// The reply tunnel ID is read from the four bytes following the
    /// flag byte.
    pub fn parse_frame(input: &[u8]) -> IResult<&[u8], Self> {
        let (rest, key) = take(DATABASE_KEY_LEN)(input)?;
        let (rest, from) = take(ROUTER_HASH_LEN)(rest)?;
        let (rest, flag) = be_u8(rest)?;

        let (rest, tunnel_id) = match flag & FLAG_REPLY_VIA_TUNNEL {
            0 => (rest, None),
            _ => {
                let (rest, tunnel_id) = be_u32(rest)?;

                (rest, Some(TunnelId::from(tunnel_id)))
            }
        };

        let (rest, num_excluded) = be_u16(rest)?;
        let (rest, excluded) = (0..num_excluded)
            .try_fold((rest, Vec::<RouterId>::new()), |(rest, mut excluded), _| {
                let (rest, hash) = take::<usize, &[u8], ()>(ROUTER_HASH_LEN)(rest).ok()?;
                excluded.push(RouterId::try_from(hash).ok()?);

                Some((rest, excluded))
            })
            .ok_or_else(|| Err::Error(make_error(input, ErrorKind::Fail)))?;

        let (rest, reply) = match (tunnel_id, flag & FLAG_REPLY_ENCRYPTED != 0) {
            (None, _) => (rest, LookupReplyKind::Direct),
            (Some(tunnel_id), false) => (rest, LookupReplyKind::Tunnel { tunnel_id }),
            (Some(tunnel_id), true) => {
                let (rest, session_key) = take(32usize)(rest)?;
                let (rest, tag_count) = be_u8(rest)?;
                if tag_count == 0 {
                    return Err(Err::Error(make_error(input, ErrorKind::Fail)));
                }
                let (rest, session_tag) = take(32usize)(rest)?;
                let (rest, _extra_tags) = take(32usize * (tag_count as usize - 1))(rest)?;

                (
                    rest,
                    LookupReplyKind::EncryptedTunnel {
                        tunnel_id,
                        session_key: session_key.try_into().expect("valid key length"),
                        session_tag: session_tag.try_into().expect("valid tag length"),
                    },
                )
            }
        };

        Ok((
            rest,
            DatabaseLookup {
                key: key.try_into().expect("valid key length"),
                from: RouterId::try_from(from).expect("valid hash length"),
                reply,
                excluded,
            },
        ))
    }

    /// Attempt to parse `input` into [`DatabaseLookup`].
    pub fn parse(input: &[u8]) -> Option<Self> {
        Some(Self::parse_frame(input).ok()?.1)
    }

    /// Serialize [`DatabaseLookup`] into a byte vector.
    pub fn serialize(self) -> BytesMut {
        let mut out = BytesMut::with_capacity(
            DATABASE_KEY_LEN + ROUTER_HASH_LEN + 5 + 2 + self.excluded.len() * ROUTER_HASH_LEN + 65,
        );

        out.put_slice(&self.key);
        out.put_slice(self.from.as_bytes());
        out.put_u8(self.reply.flag());

        match &self.reply {
            LookupReplyKind::Direct => {}
            LookupReplyKind::Tunnel { tunnel_id }
            | LookupReplyKind::EncryptedTunnel { tunnel_id, .. } => {
                out.put_u32(**tunnel_id);
            }
        }

        out.put_u16(self.excluded.len() as u16);
        for peer in &self.excluded {
            out.put_slice(peer.as_bytes());
        }

        if let LookupReplyKind::EncryptedTunnel {
            session_key,
            session_tag,
            ..
        } = &self.reply
        {
            out.put_slice(session_key);
            out.put_u8(1u8);
            out.put_slice(session_tag);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exploratory_lookup_layout() {
        let serialized = DatabaseLookup {
            key: [0x11; 32],
            from: RouterId::from([0x22; 32]),
            reply: LookupReplyKind::Direct,
            excluded: alloc::vec![RouterId::from([0u8; 32])],
        }
        .serialize();

        assert_eq!(serialized.len(), 99);
        assert_eq!(&serialized[..32], &[0x11; 32]);
        assert_eq!(&serialized[32..64], &[0x22; 32]);
        assert_eq!(serialized[64], 0x00);
        assert_eq!(&serialized[65..67], &[0x00, 0x01]);
        assert_eq!(&serialized[67..99], &[0x00; 32]);
    }

    #[test]
    fn encrypted_tunnel_reply_layout() {
        let serialized = DatabaseLookup {
            key: [0x11; 32],
            from: RouterId::from([0x22; 32]),
            reply: LookupReplyKind::EncryptedTunnel {
                tunnel_id: TunnelId::from(0x1234u32),
                session_key: [0x33; 32],
                session_tag: [0x44; 32],
            },
            excluded: Vec::new(),
        }
        .serialize();

        assert_eq!(serialized[64], 0x03);
        assert_eq!(&serialized[65..69], &0x1234u32.to_be_bytes());
        assert_eq!(&serialized[69..71], &[0x00, 0x00]);
        assert_eq!(&serialized[71..103], &[0x33; 32]);
        assert_eq!(serialized[103], 1u8);
        assert_eq!(&serialized[104..136], &[0x44; 32]);
    }

    // the source this layer derives from read the reply tunnel id
    // starting at the flag byte itself; the parser here reads it from
    // the four bytes after the flag so that it inverts `serialize()`
    #[test]
    fn parse_reads_tunnel_id_after_flag() {
        let serialized = DatabaseLookup {
            key: [0x55; 32],
            from: RouterId::from([0x66; 32]),
            reply: LookupReplyKind::Tunnel {
                tunnel_id: TunnelId::from(0xdeadbeefu32),
            },
            excluded: Vec::new(),
        }
        .serialize();

        let parsed = DatabaseLookup::parse(&serialized).unwrap();
        match parsed.reply {
            LookupReplyKind::Tunnel { tunnel_id } => {
                assert_eq!(tunnel_id, TunnelId::from(0xdeadbeefu32));
            }
            _ => panic!("invalid reply kind"),
        }
    }

    #[test]
    fn parse_roundtrip_with_excluded_peers() {
        let serialized = DatabaseLookup {
            key: [0x77; 32],
            from: RouterId::from([0x88; 32]),
            reply: LookupReplyKind::EncryptedTunnel {
                tunnel_id: TunnelId::from(1337u32),
                session_key: [0x99; 32],
                session_tag: [0xaa; 32],
            },
            excluded: alloc::vec![RouterId::from([0xbb; 32]), RouterId::from([0xcc; 32])],
        }
        .serialize();

        let parsed = DatabaseLookup::parse(&serialized).unwrap();

        assert_eq!(parsed.key, [0x77; 32]);
        assert_eq!(parsed.from, RouterId::from([0x88; 32]));
        assert_eq!(
            parsed.excluded,
            alloc::vec![RouterId::from([0xbb; 32]), RouterId::from([0xcc; 32])]
        );
        match parsed.reply {
            LookupReplyKind::EncryptedTunnel {
                tunnel_id,
                session_key,
                session_tag,
            } => {
                assert_eq!(tunnel_id, TunnelId::from(1337u32));
                assert_eq!(session_key, [0x99; 32]);
                assert_eq!(session_tag, [0xaa; 32]);
            }
            _ => panic!("invalid reply kind"),
        }
    }

    #[test]
    fn parse_rejects_truncated_lookup() {
        assert!(DatabaseLookup::parse(&[0u8; 40]).is_none());
    }
}
