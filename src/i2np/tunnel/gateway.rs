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

//! Tunnel gateway encapsulation codec.
//!
//! `tunnel_id:u32 | length:u16`, followed by the carried I2NP message.
//! Message wrapping prepends the header in place when the buffer's
//! front pad allows it and falls back to the copying `serialize()`
//! path; unwrapping parses the header to recover the carried message.

use crate::{i2np::TUNNEL_GATEWAY_HEADER_LEN, primitives::TunnelId};

use bytes::{BufMut, BytesMut};
use nom::{
    bytes::complete::take,
    number::complete::{be_u16, be_u32},
    IResult,
};

/// Tunnel gateway message.
pub struct TunnelGateway<'a> {
    /// Tunnel ID of the receiving gateway.
    pub tunnel_id: TunnelId,

    /// Carried I2NP message, header included.
    pub payload: &'a [u8],
}

impl<'a> TunnelGateway<'a> {
    /// Attempt to parse [`TunnelGateway`] from `input`.
    ///
    /// Returns the parsed message and rest of `input` on success. The
    /// length field must be covered by `input`; trailing bytes beyond
    /// it are left in the rest.
    fn parse_frame(input: &'a [u8]) -> IResult<&'a [u8], TunnelGateway<'a>> {
        let (rest, tunnel_id) = be_u32(input)?;
        let (rest, length) = be_u16(rest)?;
        let (rest, payload) = take(length as usize)(rest)?;

        Ok((
            rest,
            TunnelGateway {
                tunnel_id: TunnelId::from(tunnel_id),
                payload,
            },
        ))
    }

    /// Attempt to parse `input` into [`TunnelGateway`].
    pub fn parse(input: &'a [u8]) -> Option<TunnelGateway<'a>> {
        Some(Self::parse_frame(input).ok()?.1)
    }

    /// Write the gateway header for `tunnel_id` and `length` into
    /// `slot`, the reserved bytes directly in front of the carried
    /// message.
    ///
    /// Panics if `slot` is not exactly [`TUNNEL_GATEWAY_HEADER_LEN`]
    /// bytes.
    pub fn write_header(slot: &mut [u8], tunnel_id: TunnelId, length: u16) {
        assert_eq!(slot.len(), TUNNEL_GATEWAY_HEADER_LEN, "invalid header slot");

        slot[..4].copy_from_slice(&(*tunnel_id).to_be_bytes());
        slot[4..].copy_from_slice(&length.to_be_bytes());
    }

    /// Serialize [`TunnelGateway`] into a byte vector, copying the
    /// carried message behind the header.
    pub fn serialize(self) -> BytesMut {
        let mut out = BytesMut::with_capacity(TUNNEL_GATEWAY_HEADER_LEN + self.payload.len());

        out.put_u32(*self.tunnel_id);
        out.put_u16(self.payload.len() as u16);
        out.put_slice(self.payload);

        out
    }
}
