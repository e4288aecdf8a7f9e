//! Errors for the extension codec (ExtensionParser).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GgepError {
    #[error("GGEP block header truncated")]
    TruncatedHeader,

    #[error("GGEP varint length is missing its terminating byte")]
    TruncatedVarint,

    #[error("GGEP block declares {declared} bytes of payload, only {available} available")]
    TruncatedPayload { declared: usize, available: usize },

    #[error("COBS input contains no valid zero-free encoding")]
    BadCobs,

    #[error("deflate decompression failed")]
    BadDeflate,

    #[error("GGEP id length of {0} is out of the 1..=15 range")]
    BadIdLen(usize),
}

/// Outcome of a typed extraction contract: a GGEP block was present
/// and well-formed, absent, or present but malformed for its expected type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypedError {
    #[error("extension not present")]
    NotFound,
    #[error("extension payload is invalid for its type")]
    Invalid,
    #[error("extension payload has the wrong size: {0} bytes")]
    BadSize(usize),
}

pub type Result<T> = std::result::Result<T, GgepError>;
pub type TypedResult<T> = std::result::Result<T, TypedError>;
