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

use core::fmt;

/// Wire-level message error.
#[derive(Debug, PartialEq, Eq)]
pub enum MessageError {
    /// Message is too short to contain a full I2NP header.
    TooShort,

    /// Unrecognized message type.
    UnknownMessageType(u8),

    /// Size field is inconsistent with the buffer.
    LengthMismatch,
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "message is too short"),
            Self::UnknownMessageType(msg_type) => write!(f, "unknown message type ({msg_type})"),
            Self::LengthMismatch => write!(f, "size field inconsistent with buffer"),
        }
    }
}

/// Tunnel error.
#[derive(Debug, PartialEq, Eq)]
pub enum TunnelError {
    /// Local record not found in the build request.
    ///
    /// The build request wasn't meant for this router.
    RecordNotFound,

    /// Build record failed to parse after decryption.
    InvalidRecord,
}

impl fmt::Display for TunnelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordNotFound => write!(f, "local record not found"),
            Self::InvalidRecord => write!(f, "invalid build record"),
        }
    }
}

/// Crate-wide error type.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// Wire-level message error.
    Message(MessageError),

    /// Tunnel error.
    Tunnel(TunnelError),

    /// ElGamal encryption/decryption error.
    ElGamal,

    /// Invalid data.
    InvalidData,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(error) => write!(f, "message error: {error}"),
            Self::Tunnel(error) => write!(f, "tunnel error: {error}"),
            Self::ElGamal => write!(f, "elgamal error"),
            Self::InvalidData => write!(f, "invalid data"),
        }
    }
}

impl From<MessageError> for Error {
    fn from(value: MessageError) -> Self {
        Error::Message(value)
    }
}

impl From<TunnelError> for Error {
    fn from(value: TunnelError) -> Self {
        Error::Tunnel(value)
    }
}
