//! Ping payload.
//!
//! A bare Ping carries no body on the wire; GGEP pings (SCP, etc.) hang an
//! extension block off a zero-length payload, which is why this is modelled
//! as "whatever trailing bytes happen to be present" rather than a unit
//! struct — `gnutella_ggep` decides whether they mean anything.

use binrw::helpers::until_eof;
use binrw::prelude::*;

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq, Default)]
#[brw(little)]
pub struct PingPayload {
    #[br(parse_with = until_eof)]
    pub extension_tail: Vec<u8>,
}

impl PingPayload {
    pub fn new() -> Self {
        PingPayload::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::io::Cursor;

    #[test]
    fn bare_ping_round_trips_to_zero_bytes() {
        let payload = PingPayload::new();
        let mut buf = Vec::new();
        payload.write(&mut Cursor::new(&mut buf)).unwrap();
        assert!(buf.is_empty());
        let back = PingPayload::read(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(payload, back);
    }
}
