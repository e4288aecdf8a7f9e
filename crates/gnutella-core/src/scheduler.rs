//! DownloadScheduler: walks ServerTable's time buckets looking for a
//! server whose hold has expired and picks the next Download to start on
//! it, respecting the global and per-host concurrency caps.

use std::collections::HashMap;

use crate::config::Config;
use crate::download::{Download, DownloadId, DownloadStatus};
use crate::server_table::{ServerId, ServerTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// Connect directly to the server's address.
    Direct { server: ServerId, download: DownloadId },
    /// The server is firewalled; go through a push proxy instead.
    Push { server: ServerId, download: DownloadId },
}

pub struct DownloadScheduler {
    running_total: usize,
    running_per_host: HashMap<ServerId, usize>,
}

impl DownloadScheduler {
    pub fn new() -> Self {
        DownloadScheduler { running_total: 0, running_per_host: HashMap::new() }
    }

    pub fn running_total(&self) -> usize {
        self.running_total
    }

    fn host_running(&self, server: ServerId) -> usize {
        self.running_per_host.get(&server).copied().unwrap_or(0)
    }

    /// Picks the next batch of downloads worth starting right now, in
    /// server-due order. Does not mutate `downloads`/`servers` itself;
    /// the caller applies the transition (dialing out takes a suspend
    /// point and may fail, so the scheduler only proposes candidates).
    pub fn poll(
        &self,
        config: &Config,
        servers: &ServerTable,
        downloads: impl Fn(DownloadId) -> Option<Download> + Copy,
        now_secs: u64,
    ) -> Vec<Candidate> {
        if self.running_total >= config.max_downloads {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        let mut active_filenames: HashMap<String, ()> = HashMap::new();
        let mut budget = config.max_downloads - self.running_total;

        for server_id in servers.servers_due(now_secs) {
            if budget == 0 {
                break;
            }
            let Some(server) = servers.get(server_id) else { continue };
            if server.removed || self.host_running(server_id) >= config.max_host_downloads {
                continue;
            }

            for &download_id in &server.waiting {
                let Some(download) = downloads(download_id) else { continue };
                if !self.is_eligible(&download, now_secs) {
                    continue;
                }
                if !download.flags.overlapped && active_filenames.contains_key(&download.file_name) {
                    // Non-swarming caps at one active transfer per filename.
                    continue;
                }
                active_filenames.insert(download.file_name.clone(), ());

                candidates.push(if server.flags.push_ignored || server.port == 0 {
                    Candidate::Push { server: server_id, download: download_id }
                } else {
                    Candidate::Direct { server: server_id, download: download_id }
                });
                budget -= 1;
                break;
            }
        }

        candidates
    }

    fn is_eligible(&self, download: &Download, now_secs: u64) -> bool {
        if download.flags.suspended || download.is_terminal() {
            return false;
        }
        if !matches!(download.status, DownloadStatus::Queued | DownloadStatus::TimeoutWait) {
            return false;
        }
        if download.retry_after_secs > now_secs {
            return false;
        }
        if download.last_update_secs != 0
            && now_secs < download.last_update_secs + download.timeout_delay_secs
        {
            return false;
        }
        true
    }

    pub fn note_started(&mut self, server: ServerId) {
        self.running_total += 1;
        *self.running_per_host.entry(server).or_insert(0) += 1;
    }

    pub fn note_finished(&mut self, server: ServerId) {
        self.running_total = self.running_total.saturating_sub(1);
        if let Some(count) = self.running_per_host.get_mut(&server) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.running_per_host.remove(&server);
            }
        }
    }
}

impl Default for DownloadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnutella_dtyp::Guid;
    use std::net::Ipv4Addr;

    fn make_download(name: &str, server: ServerId) -> Download {
        Download::new(name, 0, server)
    }

    #[test]
    fn respects_global_max_downloads() {
        let config = Config { max_downloads: 0, ..Config::default() };
        let mut servers = ServerTable::new();
        let server = servers.insert(Guid::BLANK, Ipv4Addr::new(1, 2, 3, 4), 6346);
        let scheduler = DownloadScheduler::new();
        let candidates = scheduler.poll(&config, &servers, |_| None, 0);
        assert!(candidates.is_empty());
        let _ = server;
    }

    #[test]
    fn picks_a_due_waiting_download() {
        let config = Config::default();
        let mut servers = ServerTable::new();
        let server = servers.insert(Guid::BLANK, Ipv4Addr::new(1, 2, 3, 4), 6346);
        let did = slotmap::KeyData::from_ffi(1).into();
        servers.get_mut(server).unwrap().waiting.push(did);

        let download = make_download("song.ogg", server);
        let scheduler = DownloadScheduler::new();
        let candidates = scheduler.poll(
            &config,
            &servers,
            move |id| if id == did { Some(download.clone()) } else { None },
            0,
        );
        assert_eq!(candidates, vec![Candidate::Direct { server, download: did }]);
    }

    #[test]
    fn push_ignored_server_proposes_a_push_candidate() {
        let config = Config::default();
        let mut servers = ServerTable::new();
        let server = servers.insert(Guid::BLANK, Ipv4Addr::new(1, 2, 3, 4), 6346);
        servers.get_mut(server).unwrap().flags.push_ignored = true;
        let did = slotmap::KeyData::from_ffi(1).into();
        servers.get_mut(server).unwrap().waiting.push(did);

        let download = make_download("song.ogg", server);
        let scheduler = DownloadScheduler::new();
        let candidates = scheduler.poll(
            &config,
            &servers,
            move |id| if id == did { Some(download.clone()) } else { None },
            0,
        );
        assert_eq!(candidates, vec![Candidate::Push { server, download: did }]);
    }

    #[test]
    fn note_started_and_finished_track_per_host_counts() {
        let mut scheduler = DownloadScheduler::new();
        let mut servers = ServerTable::new();
        let server = servers.insert(Guid::BLANK, Ipv4Addr::new(1, 2, 3, 4), 6346);
        scheduler.note_started(server);
        assert_eq!(scheduler.running_total(), 1);
        scheduler.note_finished(server);
        assert_eq!(scheduler.running_total(), 0);
    }
}
