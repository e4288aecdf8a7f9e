//! Top-level packet envelope: header plus dispatched payload, with the
//! size-validation contract a wire codec owes its caller before it trusts
//! `payload_size` enough to allocate or slice a buffer.

use binrw::io::Cursor;
use binrw::prelude::*;

use crate::error::{GnutellaMsgError, Result};
use crate::header::{Function, Header};
use crate::ping::PingPayload;
use crate::pong::PongPayload;
use crate::push::PushPayload;
use crate::query::QueryPayload;
use crate::query_hit::QueryHitPayload;

/// A decoded payload, tagged by its `Function`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Ping(PingPayload),
    Pong(PongPayload),
    Push(PushPayload),
    Query(QueryPayload),
    QueryHit(QueryHitPayload),
}

impl Message {
    pub fn function(&self) -> Function {
        match self {
            Message::Ping(_) => Function::Ping,
            Message::Pong(_) => Function::Pong,
            Message::Push(_) => Function::Push,
            Message::Query(_) => Function::Query,
            Message::QueryHit(_) => Function::QueryHit,
        }
    }

    fn decode_body(function: Function, body: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(body);
        Ok(match function {
            Function::Ping => Message::Ping(PingPayload::read(&mut cursor)?),
            Function::Pong => Message::Pong(PongPayload::read(&mut cursor)?),
            Function::Push => Message::Push(PushPayload::read(&mut cursor)?),
            Function::Query => Message::Query(QueryPayload::read(&mut cursor)?),
            Function::QueryHit => Message::QueryHit(QueryHitPayload::read(&mut cursor)?),
        })
    }

    fn encode_body(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut cursor = Cursor::new(&mut buf);
        match self {
            Message::Ping(p) => p.write(&mut cursor)?,
            Message::Pong(p) => p.write(&mut cursor)?,
            Message::Push(p) => p.write(&mut cursor)?,
            Message::Query(p) => p.write(&mut cursor)?,
            Message::QueryHit(p) => p.write(&mut cursor)?,
        }
        Ok(buf)
    }
}

/// A complete Gnutella packet: header plus its dispatched payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub message: Message,
}

impl Packet {
    /// Decodes one packet from the front of `input`.
    ///
    /// `size_ceiling` is the caller's configured cap on `payload_size`
    /// (independent of how much data actually happens to be buffered): a
    /// peer can claim an enormous payload long before that much data has
    /// arrived, and this must be rejected before any allocation keyed on it,
    /// not after.
    pub fn decode(input: &[u8], size_ceiling: usize) -> Result<Self> {
        if input.len() < Header::STRUCT_SIZE {
            return Err(GnutellaMsgError::HeaderTooSmall(input.len()));
        }
        let mut cursor = Cursor::new(&input[..Header::STRUCT_SIZE]);
        let header = Header::read(&mut cursor)?;

        let declared = header.payload_size as usize;
        if declared > size_ceiling {
            return Err(GnutellaMsgError::SizeBomb { declared, ceiling: size_ceiling });
        }

        let available = input.len() - Header::STRUCT_SIZE;
        if declared > available {
            return Err(GnutellaMsgError::Truncated { declared, available });
        }

        let body = &input[Header::STRUCT_SIZE..Header::STRUCT_SIZE + declared];
        let message = Message::decode_body(header.function, body)?;
        Ok(Packet { header, message })
    }

    /// Returns how many bytes `decode` would need to consume a full packet
    /// whose header has already been parsed, or `None` if `input` doesn't
    /// even contain a complete header yet. Intended for a caller buffering
    /// a TCP stream and deciding whether to read more before calling
    /// [`Packet::decode`].
    pub fn framed_len(input: &[u8]) -> Option<usize> {
        if input.len() < Header::STRUCT_SIZE {
            return None;
        }
        let mut cursor = Cursor::new(&input[..Header::STRUCT_SIZE]);
        let header = Header::read(&mut cursor).ok()?;
        Some(Header::STRUCT_SIZE + header.payload_size as usize)
    }

    /// Serializes this packet, recomputing `header.payload_size` from the
    /// encoded body so callers never hand-maintain that field.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = self.message.encode_body()?;
        let mut header = self.header.clone();
        header.payload_size = body.len() as u32;
        header.function = self.message.function();

        let mut buf = Vec::with_capacity(Header::STRUCT_SIZE + body.len());
        let mut cursor = Cursor::new(&mut buf);
        header.write(&mut cursor)?;
        drop(cursor);
        buf.extend_from_slice(&body);
        Ok(buf)
    }
}
