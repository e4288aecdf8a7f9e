//! GGEP block framing: magic byte, per-block flags, id, and the varint
//! `data_len` preceding each block's (possibly COBS/deflate-wrapped)
//! payload.

use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;
use std::io::Read;

use crate::cobs::{cobs_decode, cobs_encode};
use crate::error::{GgepError, Result};
use crate::id::GgepId;
use crate::varint;

pub const MAGIC: u8 = 0xC3;

const FLAG_LAST: u8 = 0x80;
const FLAG_COBS: u8 = 0x40;
const FLAG_DEFLATE: u8 = 0x20;
const FLAG_IDLEN_MASK: u8 = 0x0F;

/// One decoded GGEP extension: id plus payload with COBS/deflate already
/// reversed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GgepBlock {
    pub id: GgepId,
    pub payload: Vec<u8>,
}

impl GgepBlock {
    pub fn new(id: GgepId, payload: impl Into<Vec<u8>>) -> Self {
        GgepBlock { id, payload: payload.into() }
    }
}

/// Parses every GGEP block in a section that starts with the [`MAGIC`]
/// byte, returning the blocks and the total number of bytes consumed
/// (including the magic byte and every block through the one flagged
/// `last`).
pub fn parse_section(input: &[u8]) -> Result<(Vec<GgepBlock>, usize)> {
    if input.is_empty() || input[0] != MAGIC {
        return Err(GgepError::TruncatedHeader);
    }
    let mut pos = 1;
    let mut blocks = Vec::new();

    loop {
        let flags = *input.get(pos).ok_or(GgepError::TruncatedHeader)?;
        pos += 1;

        let id_len = (flags & FLAG_IDLEN_MASK) as usize;
        if id_len == 0 {
            return Err(GgepError::BadIdLen(id_len));
        }
        let id_bytes =
            input.get(pos..pos + id_len).ok_or(GgepError::TruncatedHeader)?;
        pos += id_len;
        let id = GgepId::parse(&String::from_utf8_lossy(id_bytes));

        let (data_len, varint_len) = varint::decode_len(&input[pos..])?;
        pos += varint_len;

        let raw = input
            .get(pos..pos + data_len)
            .ok_or(GgepError::TruncatedPayload { declared: data_len, available: input.len() - pos })?;
        pos += data_len;

        let mut payload = raw.to_vec();
        if flags & FLAG_COBS != 0 {
            payload = cobs_decode(&payload)?;
        }
        if flags & FLAG_DEFLATE != 0 {
            payload = inflate(&payload)?;
        }

        blocks.push(GgepBlock { id, payload });

        if flags & FLAG_LAST != 0 {
            break;
        }
    }

    Ok((blocks, pos))
}

/// Options controlling how a single block is rendered: whether to apply
/// deflate and/or COBS to its payload before framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    pub deflate: bool,
    pub cobs: bool,
}

/// Renders a full GGEP section (magic byte plus every block), applying
/// `options` uniformly. The last block is automatically flagged `last`.
pub fn render_section(blocks: &[(GgepBlock, EncodeOptions)]) -> Result<Vec<u8>> {
    let mut out = vec![MAGIC];
    for (i, (block, options)) in blocks.iter().enumerate() {
        let is_last = i == blocks.len() - 1;
        let mut payload = block.payload.clone();
        if options.deflate {
            payload = deflate(&payload);
        }
        if options.cobs {
            payload = cobs_encode(&payload);
        }

        let id_bytes = block.id.as_str().as_bytes();
        if id_bytes.is_empty() || id_bytes.len() > FLAG_IDLEN_MASK as usize {
            return Err(GgepError::BadIdLen(id_bytes.len()));
        }

        let mut flags = id_bytes.len() as u8;
        if options.cobs {
            flags |= FLAG_COBS;
        }
        if options.deflate {
            flags |= FLAG_DEFLATE;
        }
        if is_last {
            flags |= FLAG_LAST;
        }

        out.push(flags);
        out.extend_from_slice(id_bytes);
        out.extend_from_slice(&varint::encode_len(payload.len()));
        out.extend_from_slice(&payload);
    }
    Ok(out)
}

fn deflate(input: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(input, Compression::default());
    let mut out = Vec::new();
    encoder.read_to_end(&mut out).expect("in-memory deflate cannot fail");
    out
}

fn inflate(input: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(input);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|_| GgepError::BadDeflate)?;
    Ok(out)
}
