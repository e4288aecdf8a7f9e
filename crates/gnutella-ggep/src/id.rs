//! The closed set of GGEP extension ids this crate recognizes.

use std::fmt;

/// A GGEP extension id.
///
/// Every variant here round-trips to its exact wire string via
/// [`GgepId::as_str`]/[`GgepId::parse`]; anything outside the closed set
/// parses to [`GgepId::Unknown`] rather than failing, matching the
/// "unknown ids preserved as `UnknownGgep`" contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GgepId {
    Sha1,
    Alt,
    AltTls,
    Alt6,
    Alt6Tls,
    Push,
    PushTls,
    Push6,
    Push6Tls,
    Ipp,
    IppTls,
    Ipp6,
    Ipp6Tls,
    A,
    A6,
    T,
    T6,
    FileSize,
    Uptime,
    CreationTime,
    Uint32,
    Hostname,
    Ipv6,
    GtkgIpv6,
    GtkgVersion,
    GtkgVersion1,
    PushProxyHostCache,
    UdpHostCache,
    Ultrapeer,
    VendorCode,
    BrowseHost,
    Udp,
    Unknown(String),
}

impl GgepId {
    pub fn as_str(&self) -> &str {
        match self {
            GgepId::Sha1 => "H",
            GgepId::Alt => "ALT",
            GgepId::AltTls => "ALT_TLS",
            GgepId::Alt6 => "ALT6",
            GgepId::Alt6Tls => "ALT6_TLS",
            GgepId::Push => "PUSH",
            GgepId::PushTls => "PUSH_TLS",
            GgepId::Push6 => "PUSH6",
            GgepId::Push6Tls => "PUSH6_TLS",
            GgepId::Ipp => "IPP",
            GgepId::IppTls => "IPP_TLS",
            GgepId::Ipp6 => "IPP6",
            GgepId::Ipp6Tls => "IPP6_TLS",
            GgepId::A => "A",
            GgepId::A6 => "A6",
            GgepId::T => "T",
            GgepId::T6 => "T6",
            GgepId::FileSize => "LF",
            GgepId::Uptime => "DU",
            GgepId::CreationTime => "CT",
            GgepId::Uint32 => "M",
            GgepId::Hostname => "HNAME",
            GgepId::Ipv6 => "6",
            GgepId::GtkgIpv6 => "GTKG.IPV6",
            GgepId::GtkgVersion => "GTKGV",
            GgepId::GtkgVersion1 => "GTKGV1",
            GgepId::PushProxyHostCache => "PHC",
            GgepId::UdpHostCache => "UDPHC",
            GgepId::Ultrapeer => "UP",
            GgepId::VendorCode => "VC",
            GgepId::BrowseHost => "BH",
            GgepId::Udp => "u",
            GgepId::Unknown(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "H" => GgepId::Sha1,
            "ALT" => GgepId::Alt,
            "ALT_TLS" => GgepId::AltTls,
            "ALT6" => GgepId::Alt6,
            "ALT6_TLS" => GgepId::Alt6Tls,
            "PUSH" => GgepId::Push,
            "PUSH_TLS" => GgepId::PushTls,
            "PUSH6" => GgepId::Push6,
            "PUSH6_TLS" => GgepId::Push6Tls,
            "IPP" => GgepId::Ipp,
            "IPP_TLS" => GgepId::IppTls,
            "IPP6" => GgepId::Ipp6,
            "IPP6_TLS" => GgepId::Ipp6Tls,
            "A" => GgepId::A,
            "A6" => GgepId::A6,
            "T" => GgepId::T,
            "T6" => GgepId::T6,
            "LF" => GgepId::FileSize,
            "DU" => GgepId::Uptime,
            "CT" => GgepId::CreationTime,
            "M" => GgepId::Uint32,
            "HNAME" => GgepId::Hostname,
            "6" => GgepId::Ipv6,
            "GTKG.IPV6" => GgepId::GtkgIpv6,
            "GTKGV" => GgepId::GtkgVersion,
            "GTKGV1" => GgepId::GtkgVersion1,
            "PHC" => GgepId::PushProxyHostCache,
            "UDPHC" => GgepId::UdpHostCache,
            "UP" => GgepId::Ultrapeer,
            "VC" => GgepId::VendorCode,
            "BH" => GgepId::BrowseHost,
            "u" => GgepId::Udp,
            other => GgepId::Unknown(other.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, GgepId::Unknown(_))
    }
}

impl fmt::Display for GgepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_id_round_trips_through_its_wire_string() {
        let known = [
            "H", "ALT", "ALT_TLS", "ALT6", "ALT6_TLS", "PUSH", "PUSH_TLS", "PUSH6", "PUSH6_TLS",
            "IPP", "IPP_TLS", "IPP6", "IPP6_TLS", "A", "A6", "T", "T6", "LF", "DU", "CT", "M",
            "HNAME", "6", "GTKG.IPV6", "GTKGV", "GTKGV1", "PHC", "UDPHC", "UP", "VC", "BH", "u",
        ];
        for id in known {
            assert_eq!(GgepId::parse(id).as_str(), id);
            assert!(GgepId::parse(id).is_known());
        }
    }

    #[test]
    fn unrecognized_id_is_preserved_verbatim() {
        let id = GgepId::parse("XYZZY");
        assert!(!id.is_known());
        assert_eq!(id.as_str(), "XYZZY");
    }
}
