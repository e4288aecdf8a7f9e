//! Errors for the transport layer: socket I/O, packet framing, and the
//! hand-rolled HTTP/1.1 codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Msg(#[from] gnutella_msg::GnutellaMsgError),

    #[error("peer closed the connection before a full packet arrived")]
    ConnectionClosed,

    #[error("malformed HTTP status line: {0:?}")]
    BadStatusLine(String),

    #[error("malformed HTTP header line: {0:?}")]
    BadHeaderLine(String),

    #[error("HTTP headers exceeded the {0}-byte limit before a blank line was seen")]
    HeadersTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, TransportError>;
