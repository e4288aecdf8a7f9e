//! Minimal HTTP/1.x status-line/header codec for the downloader.
//!
//! This is deliberately not a general-purpose HTTP client: it knows just
//! enough to build a GET/HEAD request with the handful of Gnutella-specific
//! headers, and to split a response into a status line, header map, and
//! unconsumed trailing body bytes.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::error::{Result, TransportError};

/// Cap on how much we'll buffer waiting for the header-terminating blank
/// line, independent of any `Content-Length` claim (which hasn't even been
/// parsed yet at that point).
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub http_minor: u8,
    pub code: u16,
    pub message: String,
}

impl StatusLine {
    fn parse(line: &str) -> Result<Self> {
        let mut parts = line.splitn(3, ' ');
        let version = parts.next().ok_or_else(|| TransportError::BadStatusLine(line.to_string()))?;
        let code = parts.next().ok_or_else(|| TransportError::BadStatusLine(line.to_string()))?;
        let message = parts.next().unwrap_or("").to_string();

        let http_minor = match version {
            "HTTP/1.0" => 0,
            "HTTP/1.1" => 1,
            _ => return Err(TransportError::BadStatusLine(line.to_string())),
        };
        let code: u16 =
            code.parse().map_err(|_| TransportError::BadStatusLine(line.to_string()))?;

        Ok(StatusLine { http_minor, code, message })
    }
}

/// A decoded HTTP response: status line, case-insensitive header map
/// (keys lowercased), and whatever came after the header-terminating CRLF
/// in the buffer handed to [`parse_response`] (the start of the body, if
/// any was already read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusLine,
    pub headers: HashMap<String, String>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// HTTP/1.1 defaults persistent unless `Connection: close`; HTTP/1.0
    /// defaults non-persistent unless `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        match self.header("connection").map(|v| v.to_ascii_lowercase()) {
            Some(ref v) if v == "close" => false,
            Some(ref v) if v == "keep-alive" => true,
            _ => self.status.http_minor >= 1,
        }
    }
}

/// Parses a response out of `buf`, returning the response and how many
/// bytes of `buf` its header block consumed (i.e. where the body starts).
/// Returns `None` if the header-terminating blank line hasn't arrived yet.
pub fn parse_response(buf: &[u8]) -> Result<Option<(HttpResponse, usize)>> {
    let Some(header_end) = find_header_end(buf) else {
        if buf.len() > MAX_HEADER_BYTES {
            return Err(TransportError::HeadersTooLarge(MAX_HEADER_BYTES));
        }
        return Ok(None);
    };

    let header_block = std::str::from_utf8(&buf[..header_end])
        .map_err(|_| TransportError::BadHeaderLine("non-UTF-8 header block".to_string()))?;
    let mut lines = header_block.split("\r\n").filter(|l| !l.is_empty());

    let status_line = lines.next().ok_or_else(|| TransportError::BadStatusLine(String::new()))?;
    let status = StatusLine::parse(status_line)?;

    let mut headers = HashMap::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| TransportError::BadHeaderLine(line.to_string()))?;
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    Ok(Some((HttpResponse { status, headers }, body_start(buf, header_end))))
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn body_start(_buf: &[u8], header_end: usize) -> usize {
    header_end + 4
}

/// Builds a GET or HEAD request line plus headers, CRLF-terminated and
/// ready to write to the socket.
pub struct RequestBuilder {
    method: &'static str,
    path: String,
    http_1_1: bool,
    headers: Vec<(String, String)>,
}

impl RequestBuilder {
    pub fn get(path: impl Into<String>, http_1_1: bool) -> Self {
        RequestBuilder { method: "GET", path: path.into(), http_1_1, headers: Vec::new() }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> String {
        let version = if self.http_1_1 { "HTTP/1.1" } else { "HTTP/1.0" };
        let mut out = String::new();
        let _ = writeln!(out, "{} {} {}\r", self.method, self.path, version);
        for (name, value) in &self.headers {
            let _ = write!(out, "{name}: {value}\r\n");
        }
        out.push_str("\r\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_line_and_headers() {
        let raw = b"HTTP/1.1 206 Partial Content\r\nContent-Length: 10\r\nContent-Range: bytes 0-9/100\r\n\r\nbodybytes!";
        let (response, body_offset) = parse_response(raw).unwrap().unwrap();
        assert_eq!(response.status.code, 206);
        assert_eq!(response.header("content-length"), Some("10"));
        assert_eq!(&raw[body_offset..], b"bodybytes!");
    }

    #[test]
    fn incomplete_headers_return_none() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n";
        assert_eq!(parse_response(raw).unwrap(), None);
    }

    #[test]
    fn http_1_1_defaults_keep_alive() {
        let raw = b"HTTP/1.1 200 OK\r\n\r\n";
        let (response, _) = parse_response(raw).unwrap().unwrap();
        assert!(response.keep_alive());
    }

    #[test]
    fn http_1_0_defaults_to_closing() {
        let raw = b"HTTP/1.0 200 OK\r\n\r\n";
        let (response, _) = parse_response(raw).unwrap().unwrap();
        assert!(!response.keep_alive());
    }

    #[test]
    fn connection_close_overrides_1_1_default() {
        let raw = b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n";
        let (response, _) = parse_response(raw).unwrap().unwrap();
        assert!(!response.keep_alive());
    }

    #[test]
    fn request_builder_produces_crlf_terminated_request() {
        let request = RequestBuilder::get("/get/3/song.ogg", true)
            .header("Range", "bytes=0-99")
            .header("X-Token", "abc123")
            .build();
        assert!(request.starts_with("GET /get/3/song.ogg HTTP/1.1\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
        assert!(request.contains("Range: bytes=0-99\r\n"));
    }
}
