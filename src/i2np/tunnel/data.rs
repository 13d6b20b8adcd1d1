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

use crate::primitives::TunnelId;

use bytes::{BufMut, BytesMut};
use nom::{bytes::complete::take, number::complete::be_u32, IResult};

/// Tunnel data message length.
pub const TUNNEL_DATA_LEN: usize = 1024;

/// Length of the encrypted data following the tunnel ID.
pub const TUNNEL_DATA_PAYLOAD_LEN: usize = TUNNEL_DATA_LEN - 4;

/// Tunnel data message.
///
/// The payload is the fixed-size encrypted record relayed through the
/// tunnel; its internal layout belongs to the tunnel layer.
pub struct TunnelData<'a> {
    /// Tunnel ID.
    pub tunnel_id: TunnelId,

    /// Encrypted data, fixed [`TUNNEL_DATA_PAYLOAD_LEN`] bytes.
    pub payload: &'a [u8],
}

impl<'a> TunnelData<'a> {
    /// Attempt to parse [`TunnelData`] from `input`.
    ///
    /// Returns the parsed message and rest of `input` on success.
    pub fn parse_frame(input: &'a [u8]) -> IResult<&'a [u8], TunnelData<'a>> {
        let (rest, tunnel_id) = be_u32(input)?;
        let (rest, payload) = take(TUNNEL_DATA_PAYLOAD_LEN)(rest)?;

        Ok((
            rest,
            TunnelData {
                tunnel_id: TunnelId::from(tunnel_id),
                payload,
            },
        ))
    }

    /// Attempt to parse `input` into [`TunnelData`].
    pub fn parse(input: &'a [u8]) -> Option<TunnelData<'a>> {
        Some(Self::parse_frame(input).ok()?.1)
    }

    /// Serialize [`TunnelData`] into a byte vector.
    pub fn serialize(self) -> BytesMut {
        debug_assert_eq!(self.payload.len(), TUNNEL_DATA_PAYLOAD_LEN);

        let mut out = BytesMut::with_capacity(TUNNEL_DATA_LEN);
        out.put_u32(*self.tunnel_id);
        out.put_slice(self.payload);

        out
    }
}
