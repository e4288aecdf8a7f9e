//! The 23-byte Gnutella packet header.

use binrw::prelude::*;
use gnutella_dtyp::Guid;

/// Gnutella function (message type) codes.
#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[brw(repr(u8))]
pub enum Function {
    Ping = 0x00,
    Pong = 0x01,
    Push = 0x40,
    Query = 0x80,
    QueryHit = 0x81,
}

impl std::fmt::Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Function::Ping => "Ping",
            Function::Pong => "Pong",
            Function::Push => "Push",
            Function::Query => "Query",
            Function::QueryHit => "QueryHit",
        };
        write!(f, "{name} ({:#04x})", *self as u8)
    }
}

/// Fixed 23-byte header that precedes every Gnutella packet payload.
///
/// All multi-byte header fields are little-endian. `hops` is incremented by
/// each forwarder before the local node "sees" the packet, so `hops == 1`
/// means the packet arrived directly from a neighbour.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Header {
    pub muid: Guid,
    pub function: Function,
    pub ttl: u8,
    pub hops: u8,
    pub payload_size: u32,
}

impl Header {
    pub const STRUCT_SIZE: usize = 23;

    pub fn new(muid: Guid, function: Function, ttl: u8, hops: u8, payload_size: u32) -> Self {
        Header { muid, function, ttl, hops, payload_size }
    }

    /// Whether this packet arrived directly from a neighbour (not relayed).
    pub fn is_direct(&self) -> bool {
        self.hops == 1
    }

    /// Checks the `ttl + hops <= hard_ttl_limit` invariant.
    pub fn within_ttl_limit(&self, hard_ttl_limit: u8) -> bool {
        self.ttl.saturating_add(self.hops) <= hard_ttl_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::io::Cursor;

    fn sample_header() -> Header {
        Header::new(
            Guid([
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
                0x0e, 0x0f, 0x10,
            ]),
            Function::Query,
            7,
            0,
            42,
        )
    }

    #[test]
    fn round_trip() {
        let header = sample_header();
        let mut buf = Vec::new();
        header.write(&mut Cursor::new(&mut buf)).unwrap();
        assert_eq!(buf.len(), Header::STRUCT_SIZE);
        let back = Header::read(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(header, back);
    }

    #[test]
    fn direct_neighbour_has_hops_one() {
        let mut header = sample_header();
        header.hops = 1;
        assert!(header.is_direct());
        header.hops = 2;
        assert!(!header.is_direct());
    }

    #[test]
    fn ttl_limit() {
        let mut header = sample_header();
        header.ttl = 5;
        header.hops = 2;
        assert!(header.within_ttl_limit(7));
        assert!(!header.within_ttl_limit(6));
    }
}
