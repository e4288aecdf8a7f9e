//! Gnutella wire message types and the packet codec built on top of them.
//!
//! This crate owns exactly the fixed/semi-fixed wire shapes described in the
//! protocol's message section: the 23-byte header, and the Ping/Pong/Push/
//! Query/QueryHit payload bodies. It does not know about GGEP, HUGE URNs, or
//! XML metadata — those live in `gnutella-ggep`, which treats the `tail`
//! fields here as opaque bytes to decode further.

pub mod error;
pub mod header;
pub mod message;
pub mod ping;
pub mod pong;
pub mod push;
pub mod query;
pub mod query_hit;

pub mod prelude {
    pub use crate::error::{GnutellaMsgError, Result};
    pub use crate::header::{Function, Header};
    pub use crate::message::{Message, Packet};
    pub use crate::ping::PingPayload;
    pub use crate::pong::PongPayload;
    pub use crate::push::PushPayload;
    pub use crate::query::{QueryPayload, SpeedFlags};
    pub use crate::query_hit::{QueryHitPayload, QueryHitRecord};
}

pub use prelude::*;
