//! Wire tuples for the IP:port vectors carried in GGEP "IPP"/"ALT"/"PUSH"
//! extensions (and their IPv6 "…6" siblings).

use std::net::{Ipv4Addr, Ipv6Addr};

use binrw::{BinRead, BinWrite};

/// An IPv4 address plus port, as packed into GGEP "IPP"/"ALT"/"PUSH" payloads:
/// 4 bytes of address in network (big-endian) order, followed by a
/// little-endian port. Six bytes total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct Ipv4Port {
    #[br(map = |raw: u32| Ipv4Addr::from(raw.to_be_bytes()))]
    #[bw(map = |addr: &Ipv4Addr| u32::from_be_bytes(addr.octets()))]
    pub addr: Ipv4Addr,
    #[brw(little)]
    pub port: u16,
}

impl Ipv4Port {
    pub const WIRE_SIZE: usize = 6;

    pub fn new(addr: Ipv4Addr, port: u16) -> Self {
        Ipv4Port { addr, port }
    }

    /// Routable in the sense this core cares about: not unspecified, not
    /// the loopback/broadcast/multicast ranges, and a nonzero port.
    pub fn is_routable(&self) -> bool {
        self.port != 0
            && !self.addr.is_unspecified()
            && !self.addr.is_loopback()
            && !self.addr.is_broadcast()
            && !self.addr.is_multicast()
    }
}

/// An IPv6 address plus port, as packed into GGEP "IPP6"/"ALT6"/"PUSH6"
/// payloads: 16 bytes of address, big-endian-natural order, followed by a
/// little-endian port. Eighteen bytes total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct Ipv6Port {
    #[br(map = |raw: [u8; 16]| Ipv6Addr::from(raw))]
    #[bw(map = |addr: &Ipv6Addr| addr.octets())]
    pub addr: Ipv6Addr,
    #[brw(little)]
    pub port: u16,
}

impl Ipv6Port {
    pub const WIRE_SIZE: usize = 18;

    pub fn new(addr: Ipv6Addr, port: u16) -> Self {
        Ipv6Port { addr, port }
    }

    pub fn is_routable(&self) -> bool {
        self.port != 0 && !self.addr.is_unspecified() && !self.addr.is_loopback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::io::Cursor;

    #[test]
    fn ipv4_port_round_trip() {
        let entry = Ipv4Port::new(Ipv4Addr::new(203, 0, 113, 7), 6346);
        let mut buf = Vec::new();
        entry.write(&mut Cursor::new(&mut buf)).unwrap();
        assert_eq!(buf.len(), Ipv4Port::WIRE_SIZE);
        let back = Ipv4Port::read(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(entry, back);
    }

    #[test]
    fn ipv4_port_routability() {
        assert!(Ipv4Port::new(Ipv4Addr::new(203, 0, 113, 7), 6346).is_routable());
        assert!(!Ipv4Port::new(Ipv4Addr::new(127, 0, 0, 1), 6346).is_routable());
        assert!(!Ipv4Port::new(Ipv4Addr::new(203, 0, 113, 7), 0).is_routable());
    }

    #[test]
    fn ipv6_port_round_trip() {
        let entry = Ipv6Port::new(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1), 6346);
        let mut buf = Vec::new();
        entry.write(&mut Cursor::new(&mut buf)).unwrap();
        assert_eq!(buf.len(), Ipv6Port::WIRE_SIZE);
        let back = Ipv6Port::read(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(entry, back);
    }
}
