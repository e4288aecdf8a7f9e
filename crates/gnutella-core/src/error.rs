//! The core error hierarchy: wraps each lower crate's error and
//! adds a `Drop`/`Transient`/`BadSource`/`BadFile` taxonomy on top.

use thiserror::Error;

/// Why an incoming message was discarded without closing the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    MalformedUtf8,
    MalformedSha1,
    Throttle,
    Overhead,
    HostileIp,
    BadReturnAddress,
    QueryTooShort,
    TooSmall,
    BadResult,
    MaxTtl,
    Duplicate,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Msg(#[from] gnutella_msg::GnutellaMsgError),

    #[error(transparent)]
    Ggep(#[from] gnutella_ggep::GgepError),

    #[error(transparent)]
    Transport(#[from] gnutella_transport::TransportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An incoming message was discarded; the connection stays open.
    #[error("dropped: {0}")]
    Drop(DropReason),

    /// Recoverable locally by requeue/hold/retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// The source itself is bad and must leave the download mesh.
    #[error("bad source: {0}")]
    BadSource(String),

    /// The file failed post-download verification.
    #[error("bad file: {0}")]
    BadFile(String),
}

/// The sum type a validator pipeline returns instead of using exceptions
/// for control flow: `QueryResponder`/`HitParser` are
/// built as a chain of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Keep going; `T` carries whatever state the pipeline has built so far.
    Continue(T),
    /// Stop processing and drop the message for the given reason.
    DropWith(DropReason),
    /// Stop processing, but not because of a drop (e.g. handled terminally
    /// by this stage, such as an OOB-bit rewrite with nothing left to do).
    Stop,
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Continue(v) => Outcome::Continue(f(v)),
            Outcome::DropWith(r) => Outcome::DropWith(r),
            Outcome::Stop => Outcome::Stop,
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Outcome::Continue(v) => f(v),
            Outcome::DropWith(r) => Outcome::DropWith(r),
            Outcome::Stop => Outcome::Stop,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
