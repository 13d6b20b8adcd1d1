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
    primitives::{RouterId, ROUTER_HASH_LEN},
};

use bytes::{BufMut, BytesMut};
use nom::{
    bytes::complete::take,
    error::{make_error, ErrorKind},
    number::complete::be_u8,
    Err, IResult,
};

use alloc::vec::Vec;

/// Database search reply.
pub struct DatabaseSearchReply {
    /// Key that was looked up.
    pub key: [u8; DATABASE_KEY_LEN],

    /// Identity hashes of routers closer to the key.
    pub peers: Vec<RouterId>,

    /// Identity hash of the router sending the reply.
    pub from: RouterId,
}

impl DatabaseSearchReply {
    /// Attempt to parse [`DatabaseSearchReply`] from `input`.
    ///
    /// Returns the parsed message and rest of `input` on success.
    pub fn parse_frame(input: &[u8]) -> IResult<&[u8], Self> {
        let (rest, key) = take(DATABASE_KEY_LEN)(input)?;
        let (rest, num_peers) = be_u8(rest)?;
        let (rest, peers) = (0..num_peers)
            .try_fold((rest, Vec::<RouterId>::new()), |(rest, mut peers), _| {
                let (rest, hash) = take::<usize, &[u8], ()>(ROUTER_HASH_LEN)(rest).ok()?;
                peers.push(RouterId::try_from(hash).ok()?);

                Some((rest, peers))
            })
            .ok_or_else(|| Err::Error(make_error(input, ErrorKind::Fail)))?;
        let (rest, from) = take(ROUTER_HASH_LEN)(rest)?;

        Ok((
            rest,
            DatabaseSearchReply {
                key: key.try_into().expect("valid key length"),
                peers,
                from: RouterId::try_from(from).expect("valid hash length"),
            },
        ))
    }

    /// Attempt to parse `input` into [`DatabaseSearchReply`].
    pub fn parse(input: &[u8]) -> Option<Self> {
        Some(Self::parse_frame(input).ok()?.1)
    }

    /// Serialize [`DatabaseSearchReply`] into a byte vector.
    pub fn serialize(self) -> BytesMut {
        let mut out = BytesMut::with_capacity(
            DATABASE_KEY_LEN + 1 + (self.peers.len() + 1) * ROUTER_HASH_LEN,
        );

        out.put_slice(&self.key);
        out.put_u8(self.peers.len() as u8);
        for peer in &self.peers {
            out.put_slice(peer.as_bytes());
        }
        out.put_slice(self.from.as_bytes());

        out
    }
}
