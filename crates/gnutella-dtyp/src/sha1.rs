//! SHA-1 digests and their `urn:sha1:<base32>` textual form (HUGE).

use std::fmt;
use std::str::FromStr;

use binrw::io::{Read, Seek, Write};
use binrw::{BinRead, BinResult, BinWrite, Endian};

/// A raw 160-bit SHA-1 digest, as advertised in HUGE URNs and GGEP "H"
/// extensions.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha1Digest(pub [u8; 20]);

impl Sha1Digest {
    pub const LEN: usize = 20;

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Renders the canonical `urn:sha1:<base32>` form.
    pub fn to_urn(&self) -> String {
        format!("urn:sha1:{}", base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &self.0))
    }
}

impl From<[u8; 20]> for Sha1Digest {
    fn from(bytes: [u8; 20]) -> Self {
        Sha1Digest(bytes)
    }
}

impl From<Sha1Digest> for [u8; 20] {
    fn from(digest: Sha1Digest) -> Self {
        digest.0
    }
}

impl fmt::Debug for Sha1Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha1Digest({})", self.to_urn())
    }
}

impl fmt::Display for Sha1Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_urn())
    }
}

/// Error parsing a `urn:sha1:` string: wrong prefix, wrong base32 length,
/// or invalid base32 alphabet.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Sha1UrnError {
    #[error("missing \"urn:sha1:\" prefix")]
    MissingPrefix,
    #[error("invalid base32 in SHA-1 urn")]
    InvalidBase32,
    #[error("decoded SHA-1 urn is {0} bytes, expected 20")]
    WrongLength(usize),
}

impl FromStr for Sha1Digest {
    type Err = Sha1UrnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("urn:sha1:")
            .or_else(|| s.strip_prefix("urn:bitprint:"))
            .ok_or(Sha1UrnError::MissingPrefix)?;
        // A bitprint urn tacks `.<ttroot-base32>` after the SHA-1's own 32
        // base32 characters; only the SHA-1 prefix is ever decoded here.
        let sha1_part = rest.split('.').next().unwrap_or(rest);
        let decoded = base32::decode(base32::Alphabet::Rfc4648 { padding: false }, sha1_part)
            .ok_or(Sha1UrnError::InvalidBase32)?;
        let bytes: [u8; 20] =
            decoded.try_into().map_err(|v: Vec<u8>| Sha1UrnError::WrongLength(v.len()))?;
        Ok(Sha1Digest(bytes))
    }
}

impl BinRead for Sha1Digest {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let mut bytes = [0u8; 20];
        reader.read_exact(&mut bytes)?;
        Ok(Sha1Digest(bytes))
    }
}

impl BinWrite for Sha1Digest {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urn_round_trip() {
        let digest = Sha1Digest([0x42; 20]);
        let urn = digest.to_urn();
        assert!(urn.starts_with("urn:sha1:"));
        let back: Sha1Digest = urn.parse().unwrap();
        assert_eq!(digest, back);
    }

    #[test]
    fn missing_prefix_is_rejected() {
        assert_eq!("not-a-urn".parse::<Sha1Digest>(), Err(Sha1UrnError::MissingPrefix));
    }

    #[test]
    fn bitprint_urn_uses_leading_sha1_segment() {
        let digest = Sha1Digest([0x07; 20]);
        let sha1_part = base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &digest.0);
        let bitprint = format!("urn:bitprint:{sha1_part}.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
        let back: Sha1Digest = bitprint.parse().unwrap();
        assert_eq!(digest, back);
    }
}
