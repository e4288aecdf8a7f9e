//! Socket framing and a minimal HTTP/1.1 codec for the Gnutella core.
//!
//! Mirrors `smb-transport`'s role: this crate knows how bytes move over a
//! socket, never what a `gnutella-core` state machine decides to do with
//! them.

pub mod bufpool;
pub mod error;
pub mod http;
pub mod tcp;

pub mod prelude {
    pub use crate::bufpool::{BufferPool, PooledBuf};
    pub use crate::error::{Result, TransportError};
    pub use crate::http::{HttpResponse, RequestBuilder, StatusLine};
    pub use crate::tcp::GnutellaStream;
}

pub use prelude::*;
