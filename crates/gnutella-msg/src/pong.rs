//! Pong payload: `{port, ip, num_files, num_kbytes}` plus an optional
//! extension tail (GGEP: daily uptime, push-proxy vectors, ultrapeer tokens).

use std::net::Ipv4Addr;

use binrw::helpers::until_eof;
use binrw::prelude::*;

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct PongPayload {
    pub port: u16,

    #[br(map = |raw: u32| Ipv4Addr::from(raw.to_be_bytes()))]
    #[bw(map = |addr: &Ipv4Addr| u32::from_be_bytes(addr.octets()))]
    pub ip: Ipv4Addr,

    pub num_files: u32,
    pub num_kbytes: u32,

    #[br(parse_with = until_eof)]
    pub extension_tail: Vec<u8>,
}

impl PongPayload {
    pub const MIN_SIZE: usize = 2 + 4 + 4 + 4;

    pub fn new(ip: Ipv4Addr, port: u16, num_files: u32, num_kbytes: u32) -> Self {
        PongPayload { port, ip, num_files, num_kbytes, extension_tail: Vec::new() }
    }
}
