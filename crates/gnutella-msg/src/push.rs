//! Push payload: ask a firewalled servent's neighbour to relay a connect-back
//! request.

use std::net::Ipv4Addr;

use binrw::prelude::*;
use gnutella_dtyp::Guid;

/// Fixed-size Push payload: `{servent_id, file_index, ip, port}`.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct PushPayload {
    pub servent_id: Guid,
    pub file_index: u32,

    #[br(map = |raw: u32| Ipv4Addr::from(raw.to_be_bytes()))]
    #[bw(map = |addr: &Ipv4Addr| u32::from_be_bytes(addr.octets()))]
    pub ip: Ipv4Addr,

    pub port: u16,
}

impl PushPayload {
    pub const STRUCT_SIZE: usize = 16 + 4 + 4 + 2;

    pub fn new(servent_id: Guid, file_index: u32, ip: Ipv4Addr, port: u16) -> Self {
        PushPayload { servent_id, file_index, ip, port }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::io::Cursor;

    #[test]
    fn round_trip() {
        let payload = PushPayload::new(Guid::random(&mut rand::thread_rng()), 9, Ipv4Addr::new(203, 0, 113, 5), 6346);
        let mut buf = Vec::new();
        payload.write(&mut Cursor::new(&mut buf)).unwrap();
        assert_eq!(buf.len(), PushPayload::STRUCT_SIZE);
        let back = PushPayload::read(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(payload, back);
    }
}
