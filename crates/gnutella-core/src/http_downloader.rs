//! HttpDownloader: builds a GET/HEAD request for one Download, classifies
//! the reply, and validates the overlap window before bytes are
//! persisted. The state machine itself (connecting → req-sending →
//! headers → receiving/sinking → completed) is represented by
//! `DownloadStatus`; this module supplies the pure decision functions the
//! driver in `core.rs` calls at each transition, plus the thin async I/O
//! that actually talks to the socket.

use std::collections::HashMap;

use gnutella_dtyp::Sha1Digest;
use gnutella_ggep::GgepSocketAddr;
use gnutella_transport::http::{parse_response, HttpResponse, RequestBuilder, MAX_HEADER_BYTES};
use gnutella_transport::TransportError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::download::{Chunk, Download};
use crate::server_table::DownloadServer;

pub const DOWNLOAD_MAX_SINK: usize = 16 * 1024;
pub const PARQ_COOLDOWN_SECS: u64 = 1200;

fn url_escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Builds the request path in URL-selection order: explicit URI, then
/// `/uri-res/N2R?urn:sha1:...`, then `/get/<index>/<name>`.
pub fn select_path(download: &Download) -> (String, bool) {
    if let Some(uri) = &download.uri {
        return (uri.clone(), false);
    }
    if let Some(sha1) = &download.sha1 {
        return (format!("/uri-res/N2R?{}", sha1.to_urn()), true);
    }
    (format!("/get/{}/{}", download.record_index, url_escape(&download.file_name)), false)
}

/// Builds the outgoing GET request string for a chunk. `alt_locs` are
/// known alternate sources for this file, advertised via an `X-Alt` header
/// when non-empty.
#[allow(clippy::too_many_arguments)]
pub fn build_request(
    download: &Download,
    chunk: &Chunk,
    http_1_1: bool,
    minimal: bool,
    file_size: Option<u64>,
    x_token: &str,
    host: &str,
    alt_locs: &[GgepSocketAddr],
) -> String {
    let (path, uri_res) = select_path(download);
    let mut builder = RequestBuilder::get(path, http_1_1).header("Host", host);

    let want_end = chunk.range_end > 0 && file_size.is_some_and(|size| chunk.range_end < size);
    let start = chunk.skip.saturating_sub(chunk.overlap);
    let range = if want_end {
        format!("bytes={}-{}", start, chunk.range_end.saturating_sub(1))
    } else {
        format!("bytes={start}-")
    };
    builder = builder.header("Range", range);

    if !minimal {
        builder = builder.header("X-Token", x_token);
        builder = builder.header("X-Features", "browse/1.0,g2/1.0");
    }

    let mut alt_locs_included = false;
    if !minimal && !alt_locs.is_empty() {
        let joined = alt_locs.iter().map(|a| format!("{}:{}", a.ip, a.port)).collect::<Vec<_>>().join(",");
        builder = builder.header("X-Alt", joined);
        alt_locs_included = true;
    }

    if let Some(sha1) = &download.sha1 {
        // On an N2R request the URN is already in the path; only repeat it
        // as a header when alt-locations were also advertised, so a plain
        // N2R fetch doesn't carry a redundant header.
        if !minimal && (!uri_res || alt_locs_included) {
            builder = builder.header("X-Gnutella-Content-URN", sha1.to_urn());
        }
    }
    builder.build()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParqState {
    Active { position: u32, length: u32, eta_secs: u64 },
    Passive { retry_after_secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Data can be read starting at the given byte offset / total size.
    Ranged { start: u64, total: Option<u64>, shrunk: bool },
    Redirect(String),
    PfspRetry { available_ranges: Vec<(u64, u64)>, sink_bytes: Option<u64> },
    Parq(ParqState),
    Banning,
    ParqCooldown,
    Error(String),
}

fn parse_content_range(value: &str) -> Option<(u64, u64, Option<u64>)> {
    let rest = value.strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    let end: u64 = end.trim().parse().ok()?;
    let total = if total.trim() == "*" { None } else { total.trim().parse().ok() };
    Some((start, end, total))
}

fn parse_available_ranges(value: &str) -> Vec<(u64, u64)> {
    let value = value.strip_prefix("bytes ").unwrap_or(value);
    value
        .split(',')
        .filter_map(|part| {
            let (start, end) = part.trim().split_once('-')?;
            Some((start.trim().parse().ok()?, end.trim().parse::<u64>().ok()? + 1))
        })
        .collect()
}

fn parse_parq(response: &HttpResponse) -> Option<ParqState> {
    let queue = response.header("x-queue")?;
    let mut position = None;
    let mut length = None;
    let mut eta = None;
    let mut active = false;
    for field in queue.split(',') {
        let field = field.trim();
        if let Some(v) = field.strip_prefix("position=") {
            position = v.parse().ok();
        } else if let Some(v) = field.strip_prefix("length=") {
            length = v.parse().ok();
        } else if let Some(v) = field.strip_prefix("ETA=") {
            eta = v.parse().ok();
        } else if field.starts_with("pollMin") || field.starts_with("pollMax") {
            active = true;
        }
    }
    if active || response.header("x-queued").is_some() {
        Some(ParqState::Active {
            position: position.unwrap_or(0),
            length: length.unwrap_or(0),
            eta_secs: eta.unwrap_or(0),
        })
    } else {
        let retry_after = response.header("retry-after").and_then(|v| v.parse().ok()).unwrap_or(60);
        Some(ParqState::Passive { retry_after_secs: retry_after })
    }
}

/// Classifies a parsed HTTP response against the chunk that was
/// requested.
pub fn classify_reply(response: &HttpResponse, requested: &Chunk, is_known_gtkg_peer: bool) -> ReplyOutcome {
    match response.status.code {
        301 => {
            let location = response.header("location").unwrap_or_default().to_string();
            ReplyOutcome::Redirect(location)
        }
        200 | 206 => {
            let content_length: Option<u64> = response.header("content-length").and_then(|v| v.parse().ok());
            let content_range = response.header("content-range").and_then(parse_content_range);

            if response.status.code == 206 {
                let Some((start, end, total)) = content_range else {
                    return ReplyOutcome::Error("206 without Content-Range".to_string());
                };
                let expected_start = requested.skip.saturating_sub(requested.overlap);
                if start != expected_start {
                    return ReplyOutcome::Error("Content-Range start mismatch".to_string());
                }
                if end + 1 > requested.range_end && requested.range_end > 0 {
                    return ReplyOutcome::Error("Content-Range end exceeds requested chunk".to_string());
                }
                let shrunk = requested.range_end > 0 && end + 1 < requested.range_end;
                ReplyOutcome::Ranged { start, total, shrunk }
            } else {
                // 200: either range wasn't honoured (full body) or there was
                // nothing to range over.
                if requested.range_end > 0 {
                    if let Some(total) = content_length {
                        if total == requested.range_end && requested.skip > 0 {
                            return ReplyOutcome::Error("server ignored range request".to_string());
                        }
                    }
                }
                ReplyOutcome::Ranged { start: 0, total: content_length, shrunk: false }
            }
        }
        416 | 503 => {
            if let Some(available) = response.header("x-available-ranges") {
                let ranges = parse_available_ranges(available);
                let sink_bytes = if response.header("retry-after").is_some() {
                    None
                } else {
                    response.header("content-length").and_then(|v| v.parse().ok()).map(|n: u64| n.min(DOWNLOAD_MAX_SINK as u64))
                };
                return ReplyOutcome::PfspRetry { available_ranges: ranges, sink_bytes };
            }
            if let Some(parq) = parse_parq(response) {
                return ReplyOutcome::Parq(parq);
            }
            ReplyOutcome::Error(format!("unexpected status {}", response.status.code))
        }
        401 | 403 | 404 => {
            if response.status.code == 403 && is_known_gtkg_peer {
                if response.status.message.to_ascii_lowercase().contains("removed from parq") {
                    return ReplyOutcome::ParqCooldown;
                }
            }
            log::debug!("source banned us: {} {}", response.status.code, response.status.message);
            ReplyOutcome::Banning
        }
        code => {
            log::warn!("unexpected HTTP status {code} from download source");
            ReplyOutcome::Error(format!("unexpected status {code}"))
        }
    }
}

/// Overlap validation (resume safety): compares the `overlap`
/// bytes we already have on disk against the head of what arrived.
pub fn validate_overlap(local_tail: &[u8], received_prefix: &[u8]) -> bool {
    local_tail.len() <= received_prefix.len() && local_tail == &received_prefix[..local_tail.len()]
}

/// Trims the overlap bytes off the front of received data once validated.
pub fn strip_overlap(received: &[u8], overlap: usize) -> &[u8] {
    &received[overlap.min(received.len())..]
}

pub fn minimal_http_required(server: &DownloadServer) -> bool {
    server.flags.banning || server.flags.minimal_http
}

/// Sends the request and reads back a parsed response, reusing the
/// accumulate-until-terminator pattern `GnutellaStream` uses for packets.
pub async fn fetch_headers<S>(stream: &mut S, request: &str) -> Result<(HttpResponse, Vec<u8>), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(request.as_bytes()).await?;

    let mut buf = Vec::new();
    loop {
        if let Some((response, body_start)) = parse_response(&buf)? {
            let leftover = buf[body_start..].to_vec();
            return Ok((response, leftover));
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Err(TransportError::HeadersTooLarge(MAX_HEADER_BYTES));
        }
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(TransportError::ConnectionClosed);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

pub fn sha1_content_urn(sha1: &Sha1Digest) -> String {
    sha1.to_urn()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnutella_transport::http::StatusLine;

    fn response(code: u16, headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status: StatusLine { http_minor: 1, code, message: String::new() },
            headers: headers.iter().map(|(k, v)| (k.to_ascii_lowercase(), v.to_string())).collect(),
        }
    }

    #[test]
    fn select_path_prefers_uri_res_when_sha1_known() {
        let mut download = Download::new("song.ogg", 3, slotmap::KeyData::from_ffi(0).into());
        download.sha1 = Some(Sha1Digest([0xAB; 20]));
        let (path, uri_res) = select_path(&download);
        assert!(path.starts_with("/uri-res/N2R?urn:sha1:"));
        assert!(uri_res);
    }

    #[test]
    fn select_path_falls_back_to_get_index_name() {
        let download = Download::new("my song.ogg", 3, slotmap::KeyData::from_ffi(0).into());
        let (path, uri_res) = select_path(&download);
        assert_eq!(path, "/get/3/my%20song.ogg");
        assert!(!uri_res);
    }

    #[test]
    fn classify_206_validates_content_range_start() {
        let chunk = Chunk { skip: 100, pos: 100, size: Some(900), overlap: 0, range_end: 1000 };
        let good = response(206, &[("Content-Range", "bytes 100-999/1000")]);
        assert_eq!(
            classify_reply(&good, &chunk, false),
            ReplyOutcome::Ranged { start: 100, total: Some(1000), shrunk: false }
        );

        let bad = response(206, &[("Content-Range", "bytes 50-999/1000")]);
        assert!(matches!(classify_reply(&bad, &chunk, false), ReplyOutcome::Error(_)));
    }

    #[test]
    fn classify_200_rejects_ignored_range() {
        let chunk = Chunk { skip: 100, pos: 100, size: Some(900), overlap: 0, range_end: 1000 };
        let ignored = response(200, &[("Content-Length", "1000")]);
        assert!(matches!(classify_reply(&ignored, &chunk, false), ReplyOutcome::Error(_)));
    }

    #[test]
    fn classify_503_with_available_ranges_is_pfsp() {
        let chunk = Chunk { skip: 0, pos: 0, size: Some(1000), overlap: 0, range_end: 1000 };
        let reply = response(503, &[("X-Available-Ranges", "bytes 0-99,200-299")]);
        let ReplyOutcome::PfspRetry { available_ranges, .. } = classify_reply(&reply, &chunk, false) else {
            panic!("expected PfspRetry")
        };
        assert_eq!(available_ranges, vec![(0, 100), (200, 300)]);
    }

    #[test]
    fn classify_503_with_queue_header_is_parq() {
        let chunk = Chunk::default();
        let reply = response(503, &[("X-Queue", "position=2,length=10,ETA=30,pollMin=45")]);
        assert_eq!(
            classify_reply(&reply, &chunk, false),
            ReplyOutcome::Parq(ParqState::Active { position: 2, length: 10, eta_secs: 30 })
        );
    }

    #[test]
    fn classify_403_from_gtkg_with_parq_message_is_cooldown() {
        let chunk = Chunk::default();
        let mut reply = response(403, &[]);
        reply.status.message = "Forbidden, removed from PARQ".to_string();
        assert_eq!(classify_reply(&reply, &chunk, true), ReplyOutcome::ParqCooldown);
    }

    #[test]
    fn build_request_uses_byte_range_and_x_token() {
        let download = Download::new("song.ogg", 3, slotmap::KeyData::from_ffi(0).into());
        let chunk = Chunk { skip: 100, pos: 100, size: Some(400), overlap: 0, range_end: 500 };
        let request = build_request(&download, &chunk, true, false, Some(1000), "abc123", "198.51.100.1:6346", &[]);
        assert!(request.starts_with("GET /get/3/song.ogg HTTP/1.1\r\n"));
        assert!(request.contains("Range: bytes=100-499\r\n"));
        assert!(request.contains("X-Token: abc123\r\n"));
    }

    #[test]
    fn n2r_request_omits_content_urn_without_alt_locs() {
        let mut download = Download::new("song.ogg", 3, slotmap::KeyData::from_ffi(0).into());
        download.sha1 = Some(Sha1Digest([0xAB; 20]));
        let chunk = Chunk::default();
        let request = build_request(&download, &chunk, true, false, None, "abc123", "198.51.100.1:6346", &[]);
        assert!(request.starts_with("GET /uri-res/N2R?urn:sha1:"));
        assert!(!request.contains("X-Gnutella-Content-URN"));
    }

    #[test]
    fn n2r_request_includes_content_urn_when_alt_locs_are_advertised() {
        let mut download = Download::new("song.ogg", 3, slotmap::KeyData::from_ffi(0).into());
        download.sha1 = Some(Sha1Digest([0xAB; 20]));
        let chunk = Chunk::default();
        let alt_locs = [GgepSocketAddr { ip: std::net::Ipv4Addr::new(203, 0, 113, 5).into(), port: 6346, tls: false }];
        let request = build_request(&download, &chunk, true, false, None, "abc123", "198.51.100.1:6346", &alt_locs);
        assert!(request.contains("X-Alt: 203.0.113.5:6346\r\n"));
        assert!(request.contains("X-Gnutella-Content-URN:"));
    }

    #[test]
    fn get_request_includes_content_urn_regardless_of_alt_locs() {
        let mut download = Download::new("song.ogg", 3, slotmap::KeyData::from_ffi(0).into());
        download.sha1 = Some(Sha1Digest([0xAB; 20]));
        let chunk = Chunk::default();
        let request = build_request(&download, &chunk, true, false, None, "abc123", "198.51.100.1:6346", &[]);
        assert!(request.starts_with("GET /uri-res/N2R?urn:sha1:"));
        let download2 = Download { uri: Some("/get/3/song.ogg".to_string()), ..download };
        let request2 = build_request(&download2, &chunk, true, false, None, "abc123", "198.51.100.1:6346", &[]);
        assert!(request2.starts_with("GET /get/3/song.ogg HTTP/1.1\r\n"));
        assert!(request2.contains("X-Gnutella-Content-URN:"));
    }

    #[test]
    fn overlap_validation_detects_mismatch() {
        assert!(validate_overlap(b"abcd", b"abcdefgh"));
        assert!(!validate_overlap(b"abcd", b"abXYefgh"));
    }
}
