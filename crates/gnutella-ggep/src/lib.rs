//! Decodes the interleaved HUGE/GGEP/XML "extension tail" that follows a
//! Query's query string and sits inside each QueryHit record's tag.
//!
//! `gnutella-msg` hands this crate raw bytes; this crate never reaches back
//! into the wire header/payload shapes it doesn't own.

pub mod block;
pub mod cobs;
pub mod error;
pub mod gtkgv;
pub mod id;
pub mod tail;
pub mod typed;
pub mod varint;

pub mod prelude {
    pub use crate::block::{EncodeOptions, GgepBlock};
    pub use crate::error::{GgepError, Result, TypedError, TypedResult};
    pub use crate::gtkgv::{GtkgOs, GtkgVersion};
    pub use crate::id::GgepId;
    pub use crate::tail::{parse, Extension, MAX_EXTENSIONS};
    pub use crate::typed::GgepSocketAddr;
}

pub use prelude::*;
