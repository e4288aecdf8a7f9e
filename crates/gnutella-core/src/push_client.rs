//! PushClient: push-proxy HTTP fallback and GIV handling for a firewalled
//! source, the counterpart to `http_downloader` when a server cannot be
//! dialed directly.

use gnutella_dtyp::Guid;

use crate::download::{Download, DownloadId, DownloadStatus};
use crate::server_table::{DownloadServer, PushProxy, ServerId};

/// Encodes the servent GUID the way `/gnutella/push-proxy` expects it.
pub fn server_id_param(guid: &Guid) -> String {
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, guid.as_bytes())
}

pub fn push_proxy_path(guid: &Guid, file_index: u32) -> String {
    format!("/gnutella/push-proxy?ServerId={}&file={}", server_id_param(guid), file_index)
}

/// Pops the next proxy to try, if any remain; the caller removes it from
/// `server.push_proxies` up front on the assumption that a failed proxy
/// should not be retried within this cycle.
pub fn next_proxy(server: &mut DownloadServer) -> Option<PushProxy> {
    if server.push_proxies.is_empty() {
        None
    } else {
        Some(server.push_proxies.remove(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Hold the download and try again after this many seconds.
    Hold(u64),
    /// Give up on this source entirely.
    Stop,
}

/// Retry policy on a push attempt failing: `always_push` servers
/// that haven't yet been contacted get up to 5 holds before giving up;
/// everyone else just accumulates retries with a hold/timeout-hold.
pub fn on_push_failure(
    download: &mut Download,
    always_push: bool,
    contacted: bool,
    retry_delay_secs: u64,
    timeout_hold_secs: u64,
) -> PushOutcome {
    if always_push && !contacted {
        if download.retries >= 5 {
            log::debug!("giving up on {} after 5 always-push attempts", download.file_name);
            return PushOutcome::Stop;
        }
        download.retries += 1;
        return PushOutcome::Hold(retry_delay_secs);
    }
    download.retries += 1;
    if download.retries <= 3 {
        PushOutcome::Hold(retry_delay_secs)
    } else {
        PushOutcome::Hold(timeout_hold_secs)
    }
}

/// A parsed `GIV <index>:<hex-guid>/` request line, as received on a
/// server-originated connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GivLine {
    pub file_index: u32,
    pub guid: Guid,
}

impl GivLine {
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix("GIV ")?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let (index, hex_guid) = rest.split_once(':')?;
        let file_index: u32 = index.parse().ok()?;
        if hex_guid.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (i, chunk) in hex_guid.as_bytes().chunks(2).enumerate() {
            let s = std::str::from_utf8(chunk).ok()?;
            bytes[i] = u8::from_str_radix(s, 16).ok()?;
        }
        Some(GivLine { file_index, guid: Guid::from(bytes) })
    }
}

/// Selects the Download a GIV line should resume, among every server
/// matching the incoming connection's GUID or address:
/// prefer a running download left in `PushSent`, otherwise the eldest
/// waiting download that is due, unsuspended, and not a filename
/// duplicate of one already running.
pub fn select_download_for_giv<'a>(
    candidates: impl Iterator<Item = (ServerId, &'a DownloadServer)>,
    now_secs: u64,
    downloads: impl Fn(DownloadId) -> Option<Download> + Copy,
) -> Option<(ServerId, DownloadId)> {
    let mut fallback = None;

    for (server_id, server) in candidates {
        for &id in &server.running {
            if downloads(id).is_some_and(|d| d.status == DownloadStatus::PushSent) {
                return Some((server_id, id));
            }
        }
        if fallback.is_none() {
            for &id in &server.waiting {
                let Some(download) = downloads(id) else { continue };
                if download.flags.suspended || download.retry_after_secs > now_secs {
                    continue;
                }
                fallback = Some((server_id, id));
                break;
            }
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn giv_line_parses_index_and_guid() {
        let line = "GIV 42:0123456789abcdef0123456789abcdef/";
        let giv = GivLine::parse(line).unwrap();
        assert_eq!(giv.file_index, 42);
        assert_eq!(giv.guid.as_bytes()[0], 0x01);
    }

    #[test]
    fn giv_line_rejects_malformed_input() {
        assert!(GivLine::parse("GIV nope").is_none());
        assert!(GivLine::parse("GET /foo").is_none());
    }

    #[test]
    fn always_push_holds_up_to_five_times_before_stopping() {
        let mut server = crate::server_table::ServerTable::new();
        let server_id = server.insert(Guid::BLANK, std::net::Ipv4Addr::new(1, 2, 3, 4), 0);
        let mut download = Download::new("song.ogg", 0, server_id);
        download.retries = 5;
        let outcome = on_push_failure(&mut download, true, false, 60, 1200);
        assert_eq!(outcome, PushOutcome::Stop);
    }

    #[test]
    fn push_proxy_path_encodes_guid_and_index() {
        let path = push_proxy_path(&Guid::BLANK, 7);
        assert!(path.starts_with("/gnutella/push-proxy?ServerId="));
        assert!(path.ends_with("&file=7"));
    }
}
