//! BrowseHost: the client side of fetching a remote servent's shared
//! file list over HTTP, reusing the regular Search/Download machinery
//! with a composable RX decoder chain instead of a live socket of
//! QueryHit packets arriving over the network.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder};
use gnutella_msg::message::{Message, Packet};

use crate::hit_parser::HitParser;
use crate::server_table::ServerId;

/// One transform in the RX chain. Order matters: each stage consumes the
/// previous stage's output and produces the next stage's input, ending
/// in the raw concatenated Gnutella packet stream `GnutellaFraming`
/// slices into individual packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxStage {
    Link,
    Inflate,
    Gunzip,
    Chunked,
    GnutellaFraming,
}

/// Dechunks an HTTP/1.1 chunked-transfer body.
fn dechunk(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut pos = 0;
    while pos < body.len() {
        let Some(line_end) = body[pos..].windows(2).position(|w| w == b"\r\n") else { break };
        let size_line = &body[pos..pos + line_end];
        let size_str = std::str::from_utf8(size_line).unwrap_or("0").trim();
        let size_str = size_str.split(';').next().unwrap_or("0");
        let Ok(size) = usize::from_str_radix(size_str, 16) else { break };
        pos += line_end + 2;
        if size == 0 {
            break;
        }
        if pos + size > body.len() {
            out.extend_from_slice(&body[pos..]);
            break;
        }
        out.extend_from_slice(&body[pos..pos + size]);
        pos += size + 2; // skip the chunk's trailing CRLF
    }
    out
}

fn inflate(body: &[u8]) -> Vec<u8> {
    let mut decoder = DeflateDecoder::new(body);
    let mut out = Vec::new();
    let _ = decoder.read_to_end(&mut out);
    out
}

fn gunzip(body: &[u8]) -> Vec<u8> {
    let mut decoder = GzDecoder::new(body);
    let mut out = Vec::new();
    let _ = decoder.read_to_end(&mut out);
    out
}

/// Runs `stages` in order over `body`, then frames the result into
/// `Packet`s, returning only the `QueryHit` payloads (anything else in
/// the stream, e.g. a stray Ping, is ignored here).
pub fn decode_browse_body(body: &[u8], stages: &[RxStage], size_ceiling: usize) -> Vec<gnutella_msg::query_hit::QueryHitPayload> {
    let mut buf = body.to_vec();
    for stage in stages {
        buf = match stage {
            RxStage::Link => buf,
            RxStage::Inflate => inflate(&buf),
            RxStage::Gunzip => gunzip(&buf),
            RxStage::Chunked => dechunk(&buf),
            RxStage::GnutellaFraming => buf,
        };
    }

    let mut hits = Vec::new();
    let mut offset = 0;
    while offset < buf.len() {
        let Some(needed) = Packet::framed_len(&buf[offset..]) else { break };
        if offset + needed > buf.len() {
            break;
        }
        if let Ok(packet) = Packet::decode(&buf[offset..offset + needed], size_ceiling) {
            if let Message::QueryHit(payload) = packet.message {
                hits.push(payload);
            }
        }
        offset += needed;
    }
    hits
}

/// The headers a BrowseHost request always sends: a plain `GET /`, no
/// range, advertising that we accept a raw Gnutella packet stream,
/// optionally deflate-compressed.
pub fn browse_request_headers() -> &'static [(&'static str, &'static str)] {
    &[("Accept", "application/x-gnutella-packets"), ("Accept-Encoding", "deflate")]
}

/// Feeds every decoded hit from a browse response into the search
/// registry as though it had arrived over the network.
pub fn ingest_browse_response(
    body: &[u8],
    stages: &[RxStage],
    size_ceiling: usize,
    parser: &HitParser,
    mut on_hit: impl FnMut(ServerId, crate::hit_parser::ResultSet),
    server: ServerId,
) {
    for payload in decode_browse_body(body, stages, size_ceiling) {
        if let crate::error::Outcome::Continue(result) = parser.parse(&payload) {
            on_hit(server, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnutella_dtyp::Guid;
    use gnutella_msg::header::{Function, Header};
    use gnutella_msg::query_hit::QueryHitPayload;
    use std::net::Ipv4Addr;

    fn sample_hit_packet() -> Vec<u8> {
        let mut payload = QueryHitPayload::new(Ipv4Addr::new(198, 51, 100, 1), 6346, 1200);
        payload.tail = vec![0xCC; 16];
        let packet = Packet {
            header: Header::new(Guid::random(&mut rand::thread_rng()), Function::QueryHit, 1, 0, 0),
            message: Message::QueryHit(payload),
        };
        packet.encode().unwrap()
    }

    #[test]
    fn decodes_a_bare_packet_stream_with_no_transforms() {
        let body = sample_hit_packet();
        let hits = decode_browse_body(&body, &[RxStage::Link, RxStage::GnutellaFraming], 64 * 1024);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn dechunk_reassembles_a_chunked_body() {
        let payload = b"hello world";
        let mut chunked = Vec::new();
        chunked.extend(b"5\r\nhello\r\n");
        chunked.extend(b"6\r\n world\r\n");
        chunked.extend(b"0\r\n\r\n");
        assert_eq!(dechunk(&chunked), payload);
    }

    #[test]
    fn decodes_two_concatenated_packets() {
        let mut body = sample_hit_packet();
        body.extend(sample_hit_packet());
        let hits = decode_browse_body(&body, &[RxStage::GnutellaFraming], 64 * 1024);
        assert_eq!(hits.len(), 2);
    }
}
