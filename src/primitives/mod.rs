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

use crate::crypto::base64_encode;

use core::{fmt, ops::Deref};

/// Router identity hash length.
pub const ROUTER_HASH_LEN: usize = 32;

/// Length of the truncated identity hash used to address build records.
pub const TRUNCATED_HASH_LEN: usize = 16;

/// Tunnel ID.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TunnelId(u32);

impl From<u32> for TunnelId {
    fn from(value: u32) -> Self {
        TunnelId(value)
    }
}

impl From<TunnelId> for u32 {
    fn from(value: TunnelId) -> Self {
        value.0
    }
}

impl Deref for TunnelId {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for TunnelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message ID.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(u32);

impl From<u32> for MessageId {
    fn from(value: u32) -> Self {
        MessageId(value)
    }
}

impl From<MessageId> for u32 {
    fn from(value: MessageId) -> Self {
        value.0
    }
}

impl Deref for MessageId {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Router ID.
///
/// SHA-256 hash of the router's identity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouterId([u8; ROUTER_HASH_LEN]);

impl RouterId {
    /// Get reference to the full identity hash.
    pub fn as_bytes(&self) -> &[u8; ROUTER_HASH_LEN] {
        &self.0
    }

    /// Get the truncated identity hash used to address build records.
    pub fn truncated(&self) -> &[u8] {
        &self.0[..TRUNCATED_HASH_LEN]
    }
}

impl From<[u8; ROUTER_HASH_LEN]> for RouterId {
    fn from(value: [u8; ROUTER_HASH_LEN]) -> Self {
        RouterId(value)
    }
}

impl<'a> TryFrom<&'a [u8]> for RouterId {
    type Error = ();

    fn try_from(value: &'a [u8]) -> Result<Self, Self::Error> {
        let hash: [u8; ROUTER_HASH_LEN] = value.try_into().map_err(|_| ())?;

        Ok(RouterId(hash))
    }
}

impl AsRef<[u8]> for RouterId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &base64_encode(self.0)[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_hash() {
        let router_id = RouterId::from([0xaa; 32]);

        assert_eq!(router_id.truncated().len(), TRUNCATED_HASH_LEN);
        assert_eq!(router_id.truncated(), &[0xaa; 16]);
    }

    #[test]
    fn router_id_from_slice() {
        assert!(RouterId::try_from(&[1u8; 32][..]).is_ok());
        assert!(RouterId::try_from(&[1u8; 16][..]).is_err());
    }
}
