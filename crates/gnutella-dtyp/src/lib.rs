//! Common wire data types shared by the Gnutella message (`gnutella-msg`) and
//! extension (`gnutella-ggep`) codecs.
//!
//! Mirrors the role of `smb-dtyp` in an SMB stack: small `binrw`-aware
//! newtypes that every higher layer builds on, kept free of any protocol
//! semantics of its own.

pub mod cstr;
pub mod guid;
pub mod ipport;
pub mod sha1;

pub mod prelude {
    pub use crate::cstr::NulString;
    pub use crate::guid::Guid;
    pub use crate::ipport::{Ipv4Port, Ipv6Port};
    pub use crate::sha1::{Sha1Digest, Sha1UrnError};
}

pub use prelude::*;
