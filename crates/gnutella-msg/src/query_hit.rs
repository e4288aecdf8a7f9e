//! QueryHit payload: a result set of shared files plus an optional vendor
//! trailer and the servent's GUID.
//!
//! Trailer parsing (vendor code, open/enabler/active flags, embedded GGEP)
//! is deliberately *not* done here: the boundary between "last record" and
//! "trailer" is only resolvable with a variable-length rule that
//! belongs to `HitParser` in `gnutella-core`. This crate hands back the raw
//! tail bytes (trailer-or-not, followed by the 16-byte servent GUID) for
//! that layer to split.

use std::net::Ipv4Addr;

use binrw::helpers::until_eof;
use binrw::prelude::*;
use gnutella_dtyp::NulString;

/// A single shared-file entry inside a QueryHit.
///
/// The wire form terminates with a double NUL: `name`'s terminator followed
/// immediately by `tag`'s terminator when no tag is present.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct QueryHitRecord {
    pub file_index: u32,
    pub file_size: u32,
    pub name: NulString,
    pub tag: NulString,
}

impl QueryHitRecord {
    pub fn new(file_index: u32, file_size: u32, name: impl Into<NulString>) -> Self {
        QueryHitRecord {
            file_index,
            file_size,
            name: name.into(),
            tag: NulString::default(),
        }
    }
}

/// QueryHit payload, up through the variable-length records.
///
/// `tail` holds everything after the last record: the optional vendor
/// trailer (if any) plus the mandatory 16-byte servent GUID. See
/// `gnutella_core::hit_parser` for how that tail is split and decoded.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct QueryHitPayload {
    #[bw(try_calc(u8::try_from(records.len())))]
    #[br(temp)]
    num_recs: u8,

    #[br(map = |raw: u32| Ipv4Addr::from(raw.to_be_bytes()))]
    #[bw(map = |addr: &Ipv4Addr| u32::from_be_bytes(addr.octets()))]
    pub ip: Ipv4Addr,

    pub port: u16,
    pub speed: u32,

    #[br(count = num_recs)]
    pub records: Vec<QueryHitRecord>,

    #[br(parse_with = until_eof)]
    pub tail: Vec<u8>,
}

impl QueryHitPayload {
    pub const MIN_HEADER_LEN: usize = 1 + 4 + 2 + 4;

    pub fn new(ip: Ipv4Addr, port: u16, speed: u32) -> Self {
        QueryHitPayload { ip, port, speed, records: Vec::new(), tail: Vec::new() }
    }
}
