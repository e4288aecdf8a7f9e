//! [`Guid`]: the 16-byte identifier used both as a Gnutella MUID (message
//! unique id) and as a servent GUID.

use std::fmt;
use std::io::{Read, Seek, Write};

use binrw::{BinRead, BinResult, BinWrite, Endian};

/// A 16-byte Gnutella identifier.
///
/// Used verbatim as the packet header's MUID and as the `servent_guid` that
/// terminates a QueryHit payload. Equality and hashing are byte-for-byte;
/// no endian interpretation is implied by this type itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    /// The all-zero GUID used by gtk-gnutella-style servents to mean
    /// "blank"/unknown identity.
    pub const BLANK: Guid = Guid([0u8; 16]);

    /// Draws a GUID from the given RNG.
    pub fn random<R: rand::Rng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 16];
        rng.fill(&mut bytes);
        Guid(bytes)
    }

    pub fn is_blank(&self) -> bool {
        self.0 == [0u8; 16]
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<[u8; 16]> for Guid {
    fn from(bytes: [u8; 16]) -> Self {
        Guid(bytes)
    }
}

impl From<Guid> for [u8; 16] {
    fn from(guid: Guid) -> Self {
        guid.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({self})")
    }
}

impl BinRead for Guid {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let mut bytes = [0u8; 16];
        reader.read_exact(&mut bytes).map_err(|err| binrw::Error::Io(err))?;
        Ok(Guid(bytes))
    }
}

impl BinWrite for Guid {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<()> {
        writer.write_all(&self.0).map_err(binrw::Error::Io)
    }
}
