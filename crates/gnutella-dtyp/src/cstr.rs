//! [`NulString`]: a NUL-terminated byte string, as used for Gnutella query
//! text and QueryHit record names/tags.
//!
//! Deliberately keeps the raw bytes rather than decoding to UTF-8 at the
//! wire layer: malformed encodings are a `QueryResponder`-level concern
//! (see `gnutella-core`), not a codec-level panic.

use std::io::{Read, Seek, Write};

use binrw::{BinRead, BinResult, BinWrite, Endian};

/// A byte string terminated by a single NUL byte on the wire. The NUL itself
/// is consumed on read and emitted on write, but never stored in `.bytes`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NulString {
    pub bytes: Vec<u8>,
}

impl NulString {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        NulString { bytes: bytes.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Lossily decodes the bytes as UTF-8, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Decodes strictly; fails if the bytes are not valid UTF-8.
    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }
}

impl From<&str> for NulString {
    fn from(s: &str) -> Self {
        NulString { bytes: s.as_bytes().to_vec() }
    }
}

impl From<String> for NulString {
    fn from(s: String) -> Self {
        NulString { bytes: s.into_bytes() }
    }
}

impl BinRead for NulString {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        let mut bytes = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match reader.read(&mut byte) {
                Ok(0) => {
                    return Err(binrw::Error::AssertFail {
                        pos,
                        message: "unterminated NUL string".into(),
                    });
                }
                Ok(_) if byte[0] == 0 => break,
                Ok(_) => bytes.push(byte[0]),
                Err(err) => return Err(binrw::Error::Io(err)),
            }
        }
        Ok(NulString { bytes })
    }
}

impl BinWrite for NulString {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<()> {
        writer.write_all(&self.bytes).map_err(binrw::Error::Io)?;
        writer.write_all(&[0u8]).map_err(binrw::Error::Io)
    }
}
