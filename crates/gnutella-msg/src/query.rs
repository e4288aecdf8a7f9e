//! Query payload: `{speed/flags, query_text, extension_tail}`.

use std::io::{Read, Seek, Write};

use binrw::helpers::until_eof;
use binrw::{BinRead, BinResult, BinWrite, Endian};
use gnutella_dtyp::NulString;
use modular_bitfield::prelude::*;

/// Bit layout of the Query payload's speed/flags field.
///
/// The low 10 bits are the historical "minimum speed" field, long obsolete
/// and carried only as reserved bits; the high 6 bits are the flags this
/// core interprets.
#[bitfield(bits = 16)]
#[derive(Clone, Copy)]
pub struct SpeedFlagsBits {
    pub reserved: B10,
    pub oob_reply: bool,
    pub ggep_h: bool,
    pub leaf_guided: bool,
    pub xml: bool,
    pub firewalled: bool,
    pub mark: bool,
}

/// Wire-codec wrapper around [`SpeedFlagsBits`] so it can be embedded
/// directly as a `binrw` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedFlags(pub SpeedFlagsBits);

impl SpeedFlags {
    pub fn new() -> Self {
        SpeedFlags(SpeedFlagsBits::new())
    }

    pub fn mark(&self) -> bool {
        self.0.mark()
    }
    pub fn firewalled(&self) -> bool {
        self.0.firewalled()
    }
    pub fn xml(&self) -> bool {
        self.0.xml()
    }
    pub fn leaf_guided(&self) -> bool {
        self.0.leaf_guided()
    }
    pub fn ggep_h(&self) -> bool {
        self.0.ggep_h()
    }
    pub fn oob_reply(&self) -> bool {
        self.0.oob_reply()
    }

    pub fn set_mark(&mut self, v: bool) {
        self.0.set_mark(v);
    }
    pub fn set_firewalled(&mut self, v: bool) {
        self.0.set_firewalled(v);
    }
    pub fn set_xml(&mut self, v: bool) {
        self.0.set_xml(v);
    }
    pub fn set_leaf_guided(&mut self, v: bool) {
        self.0.set_leaf_guided(v);
    }
    pub fn set_ggep_h(&mut self, v: bool) {
        self.0.set_ggep_h(v);
    }
    pub fn set_oob_reply(&mut self, v: bool) {
        self.0.set_oob_reply(v);
    }

    fn to_u16(self) -> u16 {
        u16::from_le_bytes(self.0.into_bytes())
    }

    fn from_u16(value: u16) -> Self {
        SpeedFlags(SpeedFlagsBits::from_bytes(value.to_le_bytes()))
    }
}

impl Default for SpeedFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl BinRead for SpeedFlags {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let raw = u16::read_options(reader, endian, ())?;
        Ok(SpeedFlags::from_u16(raw))
    }
}

impl BinWrite for SpeedFlags {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<()> {
        self.to_u16().write_options(writer, endian, ())
    }
}

/// Query payload.
///
/// `extension_tail` is kept as raw bytes: decoding HUGE/GGEP/XML extensions
/// out of it is [`gnutella_ggep`]'s job, not the wire codec's.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct QueryPayload {
    pub speed: SpeedFlags,
    pub query: NulString,
    #[br(parse_with = until_eof)]
    pub extension_tail: Vec<u8>,
}

impl QueryPayload {
    pub fn new(query: impl Into<NulString>, speed: SpeedFlags) -> Self {
        QueryPayload { speed, query: query.into(), extension_tail: Vec::new() }
    }
}
