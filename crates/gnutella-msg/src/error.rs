//! Errors for the wire message codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GnutellaMsgError {
    /// The supplied buffer is shorter than the header's declared `payload_size`.
    #[error("truncated packet: declared payload of {declared} bytes, only {available} available")]
    Truncated { declared: usize, available: usize },

    /// `payload_size` exceeds the configured ceiling; refuse to allocate.
    #[error("oversized packet: payload_size {declared} exceeds ceiling {ceiling}")]
    SizeBomb { declared: usize, ceiling: usize },

    /// The 23-byte header itself didn't fit in the buffer.
    #[error("buffer too small for a Gnutella header: {0} bytes")]
    HeaderTooSmall(usize),

    /// The header's function byte is not one this codec recognizes.
    #[error("unknown Gnutella function code: {0:#04x}")]
    UnknownFunction(u8),

    #[error(transparent)]
    BinRw(#[from] binrw::Error),
}

pub type Result<T> = std::result::Result<T, GnutellaMsgError>;
