//! `Core`: the aggregate that owns every other component and drives them
//! from a single `tick()` call. Concurrency model: single-threaded and
//! cooperative — the only places that ever suspend are a TCP connect, a
//! socket read/write, a sink read, a DNS lookup, or a hash computation,
//! and those all happen inside the async drivers in `http_downloader`/
//! `push_client`, never inside `Core` itself. `tick()` only touches
//! in-memory state and returns a batch of actions for the caller (the
//! CLI's event loop) to carry out.

use std::net::Ipv4Addr;
use std::time::Instant;

use gnutella_dtyp::Guid;
use rand::RngCore;
use slotmap::SlotMap;

use crate::config::Config;
use crate::download::{Download, DownloadId, DownloadStatus};
use crate::local_index::LocalIndex;
use crate::query_builder::{PeerMode, QueryBuilder};
use crate::query_responder::{MatchedHit, QueryResponder, RequesterInfo};
use crate::scheduler::{Candidate, DownloadScheduler};
use crate::search_registry::{SearchHandle, SearchKind, SearchRegistry};
use crate::server_table::{ServerId, ServerTable};

/// What the caller should actually do next, as decided by a `tick()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Connect { server: ServerId, download: DownloadId },
    PushFallback { server: ServerId, download: DownloadId },
}

pub struct Core {
    pub config: Config,
    pub searches: SearchRegistry,
    pub servers: ServerTable,
    pub downloads: SlotMap<DownloadId, Download>,
    pub scheduler: DownloadScheduler,
    pub query_builder: QueryBuilder,
    pub query_responder: QueryResponder,
}

impl Core {
    pub fn new(config: Config, mode: PeerMode, firewalled: bool) -> Self {
        let query_responder = QueryResponder::new(
            std::time::Duration::from_secs(config.node_requery_threshold_secs),
            config.min_word_length,
            config.max_ttl,
            config.max_replies,
        );
        let query_builder = QueryBuilder {
            mode,
            firewalled,
            oob_reply_addr: None,
            muid_draw_attempts: config.muid_draw_attempts,
        };
        Core {
            config,
            searches: SearchRegistry::new(),
            servers: ServerTable::new(),
            downloads: SlotMap::with_key(),
            scheduler: DownloadScheduler::new(),
            query_builder,
            query_responder,
        }
    }

    pub fn search_create(&mut self, query_text: impl Into<String>, now_secs: u64, max_results: u32) -> SearchHandle {
        self.searches.create(
            query_text,
            now_secs,
            24,
            self.config.search_min_retry_secs,
            SearchKind::Active,
            max_results,
        )
    }

    pub fn search_start(&mut self, handle: SearchHandle, rng: &mut impl RngCore) {
        let query_text = self.searches.get(handle).map(|s| s.query_text.clone());
        let builder = &self.query_builder;
        let max_ttl = self.config.max_ttl;
        self.searches.start(handle, || {
            let text = query_text?;
            builder.build(rng, &text, max_ttl, |_| false).map(|packet| packet.header.muid)
        });
    }

    pub fn search_stop(&mut self, handle: SearchHandle) {
        log::debug!("stopping search {handle:?}");
        self.searches.stop(handle);
    }

    pub fn search_close(&mut self, handle: SearchHandle) {
        let mut aborted = 0;
        for (_, download) in self.downloads.iter_mut() {
            // A transient browse Download tied to a closed Search is
            // cancelled along with it; idempotent abort makes this
            // safe even if it already finished on its own.
            if download.flags.browse && download.flags.transient {
                download.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            log::debug!("closing search {handle:?} aborted {aborted} browse download(s)");
        }
        self.searches.close(handle);
    }

    /// Routes an incoming QueryHit's matched records to every live Search
    /// bound to its MUID, counting accepted results per search and
    /// collecting any Query-Status-Response updates owed to our ultrapeers.
    pub fn on_hit(
        &mut self,
        muid: &Guid,
        result: &crate::hit_parser::ResultSet,
        max_per_hit: u32,
    ) -> Vec<crate::search_registry::QueryStatusUpdate> {
        let is_leaf = self.query_builder.mode == PeerMode::Leaf;
        self.searches.on_hit(muid, result, is_leaf, |r| r.records.len().min(max_per_hit as usize) as u32)
    }

    /// Records that a search's query was forwarded to the ultrapeer at
    /// `addr:port`.
    pub fn note_search_sent_to(&mut self, handle: SearchHandle, addr: Ipv4Addr, port: u16) {
        self.searches.note_sent_to(handle, addr, port);
    }

    /// Answers an incoming Query against `local_index`.
    #[allow(clippy::too_many_arguments)]
    pub fn respond_to_query(
        &mut self,
        query: &gnutella_msg::query::QueryPayload,
        extensions: &[gnutella_ggep::tail::Extension],
        hops: u8,
        ttl: u8,
        requester: RequesterInfo,
        local_index: &impl LocalIndex,
        now: Instant,
    ) -> crate::error::Outcome<MatchedHit> {
        self.query_responder.respond(query, extensions, hops, ttl, requester, local_index, now)
    }

    pub fn download_enqueue(
        &mut self,
        file_name: impl Into<String>,
        record_index: u32,
        guid: Guid,
        addr: Ipv4Addr,
        port: u16,
    ) -> DownloadId {
        let server = self.servers.insert(guid, addr, port);
        let download = Download::new(file_name, record_index, server);
        let id = self.downloads.insert(download);
        log::trace!("enqueued download {id:?} on server {server:?} ({addr}:{port})");
        if let Some(server) = self.servers.get_mut(server) {
            server.waiting.push(id);
        }
        id
    }

    pub fn download_abort(&mut self, id: DownloadId) {
        if let Some(download) = self.downloads.get_mut(id) {
            download.abort();
        }
    }

    /// One scheduling pass: proposes the next batch of downloads to
    /// start, given everything that is currently due.
    pub fn tick(&self, now_secs: u64) -> Vec<Action> {
        let downloads = &self.downloads;
        self.scheduler
            .poll(&self.config, &self.servers, |id| downloads.get(id).cloned(), now_secs)
            .into_iter()
            .map(|candidate| match candidate {
                Candidate::Direct { server, download } => Action::Connect { server, download },
                Candidate::Push { server, download } => Action::PushFallback { server, download },
            })
            .collect()
    }

    pub fn mark_started(&mut self, action: Action) {
        let (server, download_id) = match action {
            Action::Connect { server, download } => (server, download),
            Action::PushFallback { server, download } => (server, download),
        };
        self.scheduler.note_started(server);
        if let Some(download) = self.downloads.get_mut(download_id) {
            download.status = match action {
                Action::Connect { .. } => DownloadStatus::Connecting,
                Action::PushFallback { .. } => DownloadStatus::PushSent,
            };
        }
        if let Some(server) = self.servers.get_mut(server) {
            server.waiting.retain(|&id| id != download_id);
            server.running.push(download_id);
        }
    }

    pub fn mark_finished(&mut self, server: ServerId, download_id: DownloadId, status: DownloadStatus) {
        self.scheduler.note_finished(server);
        if status == DownloadStatus::Error {
            log::warn!("download {download_id:?} on server {server:?} finished with an error");
        }
        if let Some(download) = self.downloads.get_mut(download_id) {
            download.status = status;
        }
        if let Some(server) = self.servers.get_mut(server) {
            server.running.retain(|&id| id != download_id);
            server.stopped.push(download_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn enqueueing_a_download_places_it_in_the_servers_waiting_list() {
        let mut core = Core::new(Config::default(), PeerMode::Ultrapeer, false);
        let id = core.download_enqueue("song.ogg", 3, Guid::BLANK, Ipv4Addr::new(1, 2, 3, 4), 6346);
        let actions = core.tick(0);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::Connect { download, .. } if download == id));
    }

    #[test]
    fn mark_started_moves_the_download_to_running() {
        let mut core = Core::new(Config::default(), PeerMode::Ultrapeer, false);
        let id = core.download_enqueue("song.ogg", 3, Guid::BLANK, Ipv4Addr::new(1, 2, 3, 4), 6346);
        let actions = core.tick(0);
        core.mark_started(actions[0]);
        assert_eq!(core.downloads.get(id).unwrap().status, DownloadStatus::Connecting);
        assert_eq!(core.scheduler.running_total(), 1);
    }

    #[test]
    fn search_create_then_start_binds_a_muid() {
        let mut core = Core::new(Config::default(), PeerMode::Ultrapeer, false);
        let handle = core.search_create("hello world", 0, 255);
        let mut rng = StepRng::new(1, 1);
        core.search_start(handle, &mut rng);
        assert!(core.searches.get(handle).unwrap().is_active());
    }

    #[test]
    fn closing_a_search_aborts_its_browse_download() {
        let mut core = Core::new(Config::default(), PeerMode::Ultrapeer, false);
        let handle = core.search_create("browse", 0, 255);
        let id = core.download_enqueue("file listing", 0, Guid::BLANK, Ipv4Addr::new(1, 2, 3, 4), 6346);
        core.downloads.get_mut(id).unwrap().flags.browse = true;
        core.downloads.get_mut(id).unwrap().flags.transient = true;
        core.search_close(handle);
        assert_eq!(core.downloads.get(id).unwrap().status, DownloadStatus::Aborted);
    }
}
