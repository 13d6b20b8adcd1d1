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

use crate::{i2np::database::DATABASE_KEY_LEN, runtime::Runtime};

use bytes::{BufMut, BytesMut};
use nom::{
    bytes::complete::take,
    error::{make_error, ErrorKind},
    number::complete::{be_u16, be_u32, be_u8},
    Err, IResult,
};

use alloc::vec::Vec;
use core::marker::PhantomData;

/// Logging target for the file.
const LOG_TARGET: &str = "nuncio::i2np::database";

/// Store type of a gzip-compressed `RouterInfo`.
const STORE_TYPE_ROUTER_INFO: u8 = 0;

/// "No reply" token.
const NO_REPLY: u32 = 0;

/// Database store.
///
/// Only the `RouterInfo` store used for router self-publishing is
/// modeled; the router info itself is carried as opaque bytes, the
/// network database owns its interpretation.
pub struct DatabaseStore<R: Runtime> {
    /// Search key, the identity hash of the stored router.
    pub key: [u8; DATABASE_KEY_LEN],

    /// Uncompressed `RouterInfo` bytes.
    pub router_info: Vec<u8>,

    /// Marker for `Runtime`.
    _runtime: PhantomData<R>,
}

impl<R: Runtime> DatabaseStore<R> {
    /// Attempt to parse [`DatabaseStore`] from `input`.
    ///
    /// Returns the parsed message and rest of `input` on success.
    pub fn parse_frame(input: &[u8]) -> IResult<&[u8], Self> {
        let (rest, key) = take(DATABASE_KEY_LEN)(input)?;
        let (rest, store_type) = be_u8(rest)?;
        let (rest, reply_token) = be_u32(rest)?;

        if store_type != STORE_TYPE_ROUTER_INFO {
            tracing::debug!(
                target: LOG_TARGET,
                ?store_type,
                "unsupported store type",
            );
            return Err(Err::Error(make_error(input, ErrorKind::Fail)));
        }

        let (rest, _reply) = match reply_token == NO_REPLY {
            true => (rest, ()),
            false => {
                let (rest, _gateway_tunnel) = be_u32(rest)?;
                let (rest, _gateway_router) = take(32usize)(rest)?;

                (rest, ())
            }
        };

        let (rest, size) = be_u16(rest)?;
        let (rest, data) = take(size as usize)(rest)?;

        let router_info = R::gzip_decompress(data).ok_or_else(|| {
            tracing::warn!(
                target: LOG_TARGET,
                "failed to decompress router info",
            );

            Err::Error(make_error(input, ErrorKind::Fail))
        })?;

        Ok((
            rest,
            DatabaseStore {
                key: key.try_into().expect("valid key length"),
                router_info,
                _runtime: PhantomData,
            },
        ))
    }

    /// Attempt to parse `input` into [`DatabaseStore`].
    pub fn parse(input: &[u8]) -> Option<Self> {
        Some(Self::parse_frame(input).ok()?.1)
    }

    /// Serialize a `RouterInfo` self-publish: no reply token, payload
    /// gzip-compressed with a length prefix.
    ///
    /// Returns `None` if compression fails.
    pub fn serialize(key: &[u8; DATABASE_KEY_LEN], router_info: &[u8]) -> Option<BytesMut> {
        let compressed = R::gzip_compress(router_info)?;

        let mut out = BytesMut::with_capacity(DATABASE_KEY_LEN + 1 + 4 + 2 + compressed.len());
        out.put_slice(key);
        out.put_u8(STORE_TYPE_ROUTER_INFO);
        out.put_u32(NO_REPLY);
        out.put_u16(compressed.len() as u16);
        out.put_slice(&compressed);

        Some(out)
    }
}
