//! PersistStore: the on-disk downloads-file format, four lines per
//! record plus a blank separator, with a `RECLINES` line count recorded
//! in the preamble for forward-compatible parsing.

use std::fmt::Write as _;
use std::net::Ipv4Addr;

use gnutella_dtyp::{Guid, Sha1Digest};

pub const RECLINES: usize = 4;
/// Downloads reloaded from disk are stamped with this `create_time` so
/// they are never mistaken for a freshly-announced hit.
pub const MAGIC_TIME: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedDownload {
    pub file_name: String,
    pub size: u64,
    pub record_index: u32,
    pub guid: Option<Guid>,
    pub addr: Ipv4Addr,
    pub port: u16,
    pub hostname: Option<String>,
    pub sha1: Option<Sha1Digest>,
    pub parq_id: Option<String>,
}

fn url_escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

fn url_unescape(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&name[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

impl PersistedDownload {
    /// Renders this record as four lines, ready to append to the
    /// downloads file (no trailing blank line; the caller adds one
    /// between records).
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", url_escape(&self.file_name));

        let _ = write!(out, "{}, {}", self.size, self.record_index);
        if let Some(guid) = &self.guid {
            let _ = write!(out, ":{guid}");
        }
        let _ = write!(out, ", {}:{}", self.addr, self.port);
        if let Some(hostname) = &self.hostname {
            let _ = write!(out, ",{hostname}");
        }
        out.push('\n');

        match &self.sha1 {
            Some(sha1) => {
                let _ = writeln!(out, "{}", sha1.to_urn());
            }
            None => out.push_str("*\n"),
        }

        match &self.parq_id {
            Some(id) => {
                let _ = writeln!(out, "{id}");
            }
            None => out.push_str("*\n"),
        }

        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    TruncatedRecord,
    BadSizeLine(String),
    BadAddr(String),
}

/// Parses a full downloads-file body, skipping `#`-prefixed comment
/// lines and blank separators between records.
pub fn parse(body: &str) -> Result<Vec<PersistedDownload>, PersistError> {
    let lines: Vec<&str> = body.lines().filter(|l| !l.starts_with('#')).collect();
    let mut records = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        while i < lines.len() && lines[i].trim().is_empty() {
            i += 1;
        }
        if i >= lines.len() {
            break;
        }
        if i + RECLINES > lines.len() {
            return Err(PersistError::TruncatedRecord);
        }
        let file_name = url_unescape(lines[i]);
        let size_line = lines[i + 1];
        let sha1_line = lines[i + 2];
        let parq_line = lines[i + 3];
        i += RECLINES;

        // `<size>, <index>[:<hex-guid>], <ip>:<port>[,<hostname>]`
        let mut fields = size_line.splitn(2, ", ");
        let size_str = fields.next().unwrap_or("0");
        let rest = fields.next().unwrap_or("");
        let size: u64 = size_str.trim().parse().map_err(|_| PersistError::BadSizeLine(size_line.to_string()))?;

        let mut rest_fields = rest.splitn(2, ", ");
        let index_field = rest_fields.next().unwrap_or("");
        let addr_field = rest_fields.next().unwrap_or("");

        let (record_index, guid) = match index_field.split_once(':') {
            Some((idx, hex_guid)) => {
                let idx: u32 = idx.parse().map_err(|_| PersistError::BadSizeLine(size_line.to_string()))?;
                let mut bytes = [0u8; 16];
                for (byte_idx, chunk) in hex_guid.as_bytes().chunks(2).enumerate().take(16) {
                    let s = std::str::from_utf8(chunk).map_err(|_| PersistError::BadAddr(addr_field.to_string()))?;
                    bytes[byte_idx] =
                        u8::from_str_radix(s, 16).map_err(|_| PersistError::BadAddr(addr_field.to_string()))?;
                }
                (idx, Some(Guid::from(bytes)))
            }
            None => (
                index_field.parse().map_err(|_| PersistError::BadSizeLine(size_line.to_string()))?,
                None,
            ),
        };

        let (addr_port, hostname) = match addr_field.split_once(',') {
            Some((addr_port, hostname)) => (addr_port, Some(hostname.to_string())),
            None => (addr_field, None),
        };
        let (addr_str, port_str) =
            addr_port.split_once(':').ok_or_else(|| PersistError::BadAddr(addr_field.to_string()))?;
        let addr: Ipv4Addr = addr_str.parse().map_err(|_| PersistError::BadAddr(addr_field.to_string()))?;
        let port: u16 = port_str.parse().map_err(|_| PersistError::BadAddr(addr_field.to_string()))?;

        let sha1 = if sha1_line.trim() == "*" { None } else { sha1_line.trim().parse::<Sha1Digest>().ok() };
        let parq_id = if parq_line.trim() == "*" { None } else { Some(parq_line.trim().to_string()) };

        records.push(PersistedDownload {
            file_name,
            size,
            record_index,
            guid,
            addr,
            port,
            hostname,
            sha1,
            parq_id,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_then_parse_round_trips() {
        let record = PersistedDownload {
            file_name: "my song.ogg".to_string(),
            size: 123456,
            record_index: 7,
            guid: Some(Guid::BLANK),
            addr: Ipv4Addr::new(198, 51, 100, 1),
            port: 6346,
            hostname: Some("example.org".to_string()),
            sha1: Some(Sha1Digest([0xAB; 20])),
            parq_id: Some("abc-def".to_string()),
        };
        let rendered = record.render();
        let parsed = parse(&rendered).unwrap();
        assert_eq!(parsed, vec![record]);
    }

    #[test]
    fn missing_sha1_and_parq_render_as_asterisks() {
        let record = PersistedDownload {
            file_name: "song.ogg".to_string(),
            size: 100,
            record_index: 0,
            guid: None,
            addr: Ipv4Addr::new(1, 2, 3, 4),
            port: 6346,
            hostname: None,
            sha1: None,
            parq_id: None,
        };
        let rendered = record.render();
        assert!(rendered.contains("\n*\n*\n"));
        let parsed = parse(&rendered).unwrap();
        assert_eq!(parsed[0].sha1, None);
        assert_eq!(parsed[0].parq_id, None);
    }

    #[test]
    fn comment_lines_are_skipped() {
        let body = "# downloads file\n# version 1\nsong.ogg\n100, 0, 1.2.3.4:6346\n*\n*\n";
        let parsed = parse(body).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].file_name, "song.ogg");
    }
}
