//! MUID selection, including the OOB-bearing MUID encoding QueryBuilder
//! uses when out-of-band replies are enabled.

use std::net::Ipv4Addr;

use gnutella_dtyp::Guid;
use rand::RngCore;

/// Draws a fresh random MUID with no embedded structure.
pub fn random_muid(rng: &mut impl RngCore) -> Guid {
    Guid::random(rng)
}

/// Draws a MUID with the requester's OOB reply address embedded: bytes
/// 0..4 are the IP (little-endian octets), bytes 13..15 are the port
/// (little-endian). The remaining bytes are random filler.
pub fn oob_muid(rng: &mut impl RngCore, reply_addr: Ipv4Addr, reply_port: u16) -> Guid {
    let mut bytes = Guid::random(rng).as_bytes().to_owned();
    let mut octets = reply_addr.octets();
    octets.reverse(); // network order -> little-endian placement
    bytes[0..4].copy_from_slice(&octets);
    bytes[13..15].copy_from_slice(&reply_port.to_le_bytes());
    Guid::from(bytes)
}

/// Recovers the OOB reply address embedded by [`oob_muid`]. Only
/// meaningful for MUIDs actually produced that way; this does no
/// validation of "is this really an OOB MUID" (that's the caller's job,
/// same as QueryResponder's OOB handling).
pub fn decode_oob_addr(muid: &Guid) -> (Ipv4Addr, u16) {
    let bytes = muid.as_bytes();
    let mut octets = [bytes[0], bytes[1], bytes[2], bytes[3]];
    octets.reverse();
    let addr = Ipv4Addr::from(octets);
    let port = u16::from_le_bytes([bytes[13], bytes[14]]);
    (addr, port)
}

/// Draws a MUID not already present in `is_taken`, attempting up to
/// `attempts` random draws before giving up.
pub fn draw_unique_muid(
    rng: &mut impl RngCore,
    attempts: u32,
    is_taken: impl Fn(&Guid) -> bool,
) -> Option<Guid> {
    for _ in 0..attempts {
        let candidate = random_muid(rng);
        if !is_taken(&candidate) {
            return Some(candidate);
        }
    }
    None
}
