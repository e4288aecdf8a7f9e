//! Typed extraction contracts over a decoded set of [`GgepBlock`]s.
//!
//! Every function here returns `Ok(value)`, `Err(NotFound)` when the id is
//! absent, or `Err(Invalid)`/`Err(BadSize)` when it is present but
//! malformed — the three-way split the component design calls for, instead
//! of folding "absent" and "malformed" into one `None`.

use std::net::{Ipv4Addr, Ipv6Addr};

use gnutella_dtyp::Sha1Digest;

use crate::block::GgepBlock;
use crate::error::{TypedError, TypedResult};
use crate::id::GgepId;

fn find<'a>(blocks: &'a [GgepBlock], id: &GgepId) -> Option<&'a [u8]> {
    blocks.iter().find(|b| &b.id == id).map(|b| b.payload.as_slice())
}

/// SHA-1 (and bitprint) payload from the "H" extension.
///
/// `payload[0] == 0x01` is a plain SHA-1 (20 bytes follow); `0x02` is a
/// bitprint, SHA-1 followed by a 24-byte Tiger-tree root (only the SHA-1 is
/// returned here).
pub fn sha1(blocks: &[GgepBlock]) -> TypedResult<Sha1Digest> {
    let payload = find(blocks, &GgepId::Sha1).ok_or(TypedError::NotFound)?;
    match payload.first() {
        Some(0x01) if payload.len() == 21 => {
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&payload[1..21]);
            Ok(Sha1Digest(bytes))
        }
        Some(0x02) if payload.len() == 45 => {
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&payload[1..21]);
            Ok(Sha1Digest(bytes))
        }
        _ => Err(TypedError::Invalid),
    }
}

/// Decodes a trailing-zero-stripped little-endian integer, as used by
/// "LF", "DU", "CT", and "M". `max_len` is 8 bytes for 64-bit fields, 4 for
/// "M"'s uint32.
fn varlen_uint(payload: &[u8], max_len: usize) -> TypedResult<u64> {
    if payload.is_empty() || payload.len() > max_len {
        return Err(TypedError::BadSize(payload.len()));
    }
    let mut value: u64 = 0;
    for (i, &byte) in payload.iter().enumerate() {
        value |= (byte as u64) << (8 * i);
    }
    Ok(value)
}

pub fn filesize(blocks: &[GgepBlock]) -> TypedResult<u64> {
    let payload = find(blocks, &GgepId::FileSize).ok_or(TypedError::NotFound)?;
    let value = varlen_uint(payload, 8)?;
    if value == 0 {
        return Err(TypedError::Invalid);
    }
    Ok(value)
}

pub fn uptime(blocks: &[GgepBlock]) -> TypedResult<u64> {
    let payload = find(blocks, &GgepId::Uptime).ok_or(TypedError::NotFound)?;
    varlen_uint(payload, 8)
}

pub fn creation_time(blocks: &[GgepBlock]) -> TypedResult<u64> {
    let payload = find(blocks, &GgepId::CreationTime).ok_or(TypedError::NotFound)?;
    varlen_uint(payload, 8)
}

pub fn uint32(blocks: &[GgepBlock]) -> TypedResult<u32> {
    let payload = find(blocks, &GgepId::Uint32).ok_or(TypedError::NotFound)?;
    varlen_uint(payload, 4).map(|v| v as u32)
}

/// IPv6 address from "6" or "GTKG.IPV6". An empty payload means
/// "unspecified" (returned as `None`); anything other than 0 or 16 bytes is
/// `BadSize`.
pub fn ipv6(blocks: &[GgepBlock], id: &GgepId) -> TypedResult<Option<Ipv6Addr>> {
    let payload = find(blocks, id).ok_or(TypedError::NotFound)?;
    match payload.len() {
        0 => Ok(None),
        16 => {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(payload);
            Ok(Some(Ipv6Addr::from(bytes)))
        }
        other => Err(TypedError::BadSize(other)),
    }
}

/// Hostname from "HNAME": must be UTF-8, contain no NUL, parse as a DNS
/// name, and must *not* also parse as a bare IP address literal.
pub fn hostname(blocks: &[GgepBlock]) -> TypedResult<String> {
    let payload = find(blocks, &GgepId::Hostname).ok_or(TypedError::NotFound)?;
    let text = std::str::from_utf8(payload).map_err(|_| TypedError::Invalid)?;
    if text.contains('\0') || text.is_empty() {
        return Err(TypedError::Invalid);
    }
    if text.parse::<Ipv4Addr>().is_ok() || text.parse::<Ipv6Addr>().is_ok() {
        return Err(TypedError::Invalid);
    }
    if url::Host::parse(text).is_err() {
        return Err(TypedError::Invalid);
    }
    Ok(text.to_string())
}

/// One entry in an IP:port vector ("IPP", "ALT", "PUSH", and v6 variants).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GgepSocketAddr {
    pub ip: std::net::IpAddr,
    pub port: u16,
    pub tls: bool,
}

fn ip_port_vector_raw(payload: &[u8], entry_len: usize) -> TypedResult<usize> {
    if entry_len == 0 || payload.len() % entry_len != 0 {
        return Err(TypedError::BadSize(payload.len()));
    }
    Ok(payload.len() / entry_len)
}

/// Decodes an IPv4 IP:port vector (6 bytes/entry: 4 big-endian IP octets,
/// 2 little-endian port), applying an optional "_TLS" bitmap companion.
pub fn ipv4_vector(payload: &[u8], tls_bitmap: Option<&[u8]>) -> TypedResult<Vec<GgepSocketAddr>> {
    let count = ip_port_vector_raw(payload, 6)?;
    let tls = expand_tls_bitmap(tls_bitmap, count);
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let chunk = &payload[i * 6..i * 6 + 6];
        let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
        let port = u16::from_le_bytes([chunk[4], chunk[5]]);
        out.push(GgepSocketAddr { ip: ip.into(), port, tls: tls[i] });
    }
    Ok(out)
}

/// Decodes an IPv6 IP:port vector (18 bytes/entry).
pub fn ipv6_vector(payload: &[u8], tls_bitmap: Option<&[u8]>) -> TypedResult<Vec<GgepSocketAddr>> {
    let count = ip_port_vector_raw(payload, 18)?;
    let tls = expand_tls_bitmap(tls_bitmap, count);
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let chunk = &payload[i * 18..i * 18 + 18];
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&chunk[..16]);
        let port = u16::from_le_bytes([chunk[16], chunk[17]]);
        out.push(GgepSocketAddr { ip: Ipv6Addr::from(octets).into(), port, tls: tls[i] });
    }
    Ok(out)
}

fn expand_tls_bitmap(bitmap: Option<&[u8]>, count: usize) -> Vec<bool> {
    let Some(bitmap) = bitmap else {
        return vec![false; count];
    };
    (0..count)
        .map(|i| bitmap.get(i / 8).is_some_and(|byte| byte & (1 << (7 - (i % 8))) != 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::GgepBlock;

    fn blocks_with(id: GgepId, payload: Vec<u8>) -> Vec<GgepBlock> {
        vec![GgepBlock::new(id, payload)]
    }

    #[test]
    fn sha1_plain() {
        let mut payload = vec![0x01];
        payload.extend([0xAB; 20]);
        let blocks = blocks_with(GgepId::Sha1, payload);
        assert_eq!(sha1(&blocks).unwrap(), Sha1Digest([0xAB; 20]));
    }

    #[test]
    fn sha1_missing_is_not_found() {
        assert_eq!(sha1(&[]), Err(TypedError::NotFound));
    }

    #[test]
    fn filesize_zero_is_invalid() {
        let blocks = blocks_with(GgepId::FileSize, vec![0]);
        assert_eq!(filesize(&blocks), Err(TypedError::Invalid));
    }

    #[test]
    fn filesize_strips_trailing_zero_bytes() {
        let blocks = blocks_with(GgepId::FileSize, vec![0x00, 0x10]);
        assert_eq!(filesize(&blocks).unwrap(), 0x1000);
    }

    #[test]
    fn ipv6_empty_means_unspecified() {
        let blocks = blocks_with(GgepId::Ipv6, vec![]);
        assert_eq!(ipv6(&blocks, &GgepId::Ipv6).unwrap(), None);
    }

    #[test]
    fn ipv6_wrong_size_is_bad_size() {
        let blocks = blocks_with(GgepId::Ipv6, vec![0; 5]);
        assert_eq!(ipv6(&blocks, &GgepId::Ipv6), Err(TypedError::BadSize(5)));
    }

    #[test]
    fn hostname_rejects_ip_literal() {
        let blocks = blocks_with(GgepId::Hostname, b"192.0.2.1".to_vec());
        assert_eq!(hostname(&blocks), Err(TypedError::Invalid));
    }

    #[test]
    fn hostname_accepts_dns_name() {
        let blocks = blocks_with(GgepId::Hostname, b"relay.example.invalid".to_vec());
        assert_eq!(hostname(&blocks).unwrap(), "relay.example.invalid");
    }

    #[test]
    fn ipv4_vector_with_tls_bitmap() {
        let mut payload = Vec::new();
        payload.extend([198, 51, 100, 1, 0x0A, 0x18]); // port 6154 LE
        payload.extend([198, 51, 100, 2, 0x0A, 0x18]);
        let tls = [0b1000_0000u8];
        let entries = ipv4_vector(&payload, Some(&tls)).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].tls);
        assert!(!entries[1].tls);
    }

    #[test]
    fn ipv4_vector_bad_length_is_rejected() {
        assert_eq!(ip_port_vector_raw(&[0u8; 5], 6), Err(TypedError::BadSize(5)));
    }
}
