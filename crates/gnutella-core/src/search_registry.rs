//! SearchRegistry: the live Searches, the MUID→Search map, and the
//! reissue-timer math that drives automatic requerying.

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::time::Duration;

use gnutella_dtyp::Guid;
use slotmap::{new_key_type, SlotMap};

use crate::hit_parser::ResultSet;

new_key_type! { pub struct SearchHandle; }

const MUID_MAX: usize = 4;
pub const SEARCH_MIN_RETRY_SECS: u64 = 1800;

/// `0xFFFF` is reserved to mean "search closed"; a live result count never
/// advertises past this.
pub const QUERY_STATUS_MAX: u32 = 0xFFFE;

/// A Query-Status-Response to send to one of the ultrapeers this search's
/// query was forwarded to, reporting how many results we've kept so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryStatusUpdate {
    pub addr: Ipv4Addr,
    pub port: u16,
    pub muid: Guid,
    pub kept: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Active,
    Passive,
    Browse,
}

#[derive(Debug, Clone)]
pub struct Search {
    pub query_text: String,
    pub create_time_secs: u64,
    pub lifetime_hours: u32,
    pub reissue_timeout_secs: u64,
    pub kind: SearchKind,
    pub frozen: bool,
    /// Most recent first, bounded to [`MUID_MAX`].
    pub muid_history: VecDeque<Guid>,
    pub kept_results: u32,
    pub items_shown: u32,
    pub max_results: u32,
    /// Ultrapeers this search's query was forwarded to; a leaf reports
    /// kept-result counts back to each one until `reissue` starts a fresh
    /// round and clears it.
    pub sent_to: Vec<(Ipv4Addr, u16)>,
    query_emitted: bool,
}

impl Search {
    pub fn is_active(&self) -> bool {
        !self.muid_history.is_empty()
    }
}

pub struct SearchRegistry {
    searches: SlotMap<SearchHandle, Search>,
    muid_to_search: HashMap<Guid, SearchHandle>,
    passive: Vec<SearchHandle>,
}

impl SearchRegistry {
    pub fn new() -> Self {
        SearchRegistry { searches: SlotMap::with_key(), muid_to_search: HashMap::new(), passive: Vec::new() }
    }

    pub fn create(
        &mut self,
        query_text: impl Into<String>,
        create_time_secs: u64,
        lifetime_hours: u32,
        reissue_timeout_secs: u64,
        kind: SearchKind,
        max_results: u32,
    ) -> SearchHandle {
        let search = Search {
            query_text: query_text.into(),
            create_time_secs,
            lifetime_hours,
            reissue_timeout_secs,
            kind,
            frozen: true,
            muid_history: VecDeque::with_capacity(MUID_MAX),
            kept_results: 0,
            items_shown: 0,
            max_results,
            sent_to: Vec::new(),
            query_emitted: false,
        };
        let handle = self.searches.insert(search);
        if kind == SearchKind::Passive {
            self.passive.push(handle);
        }
        handle
    }

    pub fn get(&self, handle: SearchHandle) -> Option<&Search> {
        self.searches.get(handle)
    }

    /// Thaws a search; mints a MUID via `mint_muid` when active and no
    /// MUID has been issued yet.
    pub fn start(&mut self, handle: SearchHandle, mint_muid: impl FnOnce() -> Option<Guid>) {
        let Some(search) = self.searches.get_mut(handle) else { return };
        search.frozen = false;
        if search.kind == SearchKind::Active && search.muid_history.is_empty() {
            if let Some(muid) = mint_muid() {
                self.bind_muid(handle, muid);
            }
        }
    }

    fn bind_muid(&mut self, handle: SearchHandle, muid: Guid) {
        if let Some(search) = self.searches.get_mut(handle) {
            search.muid_history.push_front(muid);
            search.muid_history.truncate(MUID_MAX);
            search.query_emitted = true;
        }
        self.muid_to_search.insert(muid, handle);
    }

    pub fn stop(&mut self, handle: SearchHandle) {
        if let Some(search) = self.searches.get_mut(handle) {
            search.frozen = true;
        }
    }

    /// Mints a fresh MUID and rebroadcasts, unless the search has expired
    /// (in which case it is marked so no further reissue happens).
    pub fn reissue(&mut self, handle: SearchHandle, now_secs: u64, mint_muid: impl FnOnce() -> Option<Guid>) {
        let Some(search) = self.searches.get(handle) else { return };
        let expired = now_secs
            >= search.create_time_secs + search.lifetime_hours as u64 * 3600;
        if expired {
            if let Some(search) = self.searches.get_mut(handle) {
                search.lifetime_hours = 0;
            }
            return;
        }
        if let Some(search) = self.searches.get_mut(handle) {
            search.sent_to.clear();
        }
        if let Some(muid) = mint_muid() {
            self.bind_muid(handle, muid);
        }
    }

    /// Records that this search's query was forwarded to the ultrapeer at
    /// `addr:port`, so it becomes a recipient of future Query-Status-Response
    /// updates.
    pub fn note_sent_to(&mut self, handle: SearchHandle, addr: Ipv4Addr, port: u16) {
        if let Some(search) = self.searches.get_mut(handle) {
            if !search.sent_to.contains(&(addr, port)) {
                search.sent_to.push((addr, port));
            }
        }
    }

    pub fn close(&mut self, handle: SearchHandle) {
        if let Some(search) = self.searches.remove(handle) {
            for muid in &search.muid_history {
                self.muid_to_search.remove(muid);
            }
        }
        self.passive.retain(|&h| h != handle);
    }

    pub fn search_for_muid(&self, muid: &Guid) -> Option<SearchHandle> {
        self.muid_to_search.get(muid).copied()
    }

    /// Recipients for an arriving hit: the active Search with a matching
    /// MUID (if not frozen), plus every non-frozen passive Search.
    pub fn recipients_for_hit(&self, muid: &Guid) -> Vec<SearchHandle> {
        let mut recipients = Vec::new();
        if let Some(&handle) = self.muid_to_search.get(muid) {
            if let Some(search) = self.searches.get(handle) {
                if !search.frozen {
                    recipients.push(handle);
                }
            }
        }
        for &handle in &self.passive {
            if recipients.contains(&handle) {
                continue;
            }
            if let Some(search) = self.searches.get(handle) {
                if !search.frozen {
                    recipients.push(handle);
                }
            }
        }
        recipients
    }

    /// Feeds an arriving hit's kept-result count to every recipient search,
    /// collecting the Query-Status-Response updates any of them owe their
    /// ultrapeers as a leaf.
    pub fn on_hit(
        &mut self,
        muid: &Guid,
        result: &ResultSet,
        is_leaf: bool,
        upstream_keeps: impl Fn(&ResultSet) -> u32,
    ) -> Vec<QueryStatusUpdate> {
        let mut updates = Vec::new();
        for handle in self.recipients_for_hit(muid) {
            let kept = upstream_keeps(result);
            updates.extend(self.kept(handle, kept, is_leaf));
        }
        updates
    }

    /// Accumulates `delta` kept results for `handle`. When we are a leaf and
    /// the search is still active, returns one Query-Status-Response per
    /// ultrapeer the query was sent to, carrying `min(kept, QUERY_STATUS_MAX)`.
    pub fn kept(&mut self, handle: SearchHandle, delta: u32, is_leaf: bool) -> Vec<QueryStatusUpdate> {
        let Some(search) = self.searches.get_mut(handle) else { return Vec::new() };
        search.kept_results += delta;

        if !is_leaf || search.frozen || search.sent_to.is_empty() {
            return Vec::new();
        }
        let Some(&muid) = search.muid_history.front() else { return Vec::new() };
        let kept = search.kept_results.min(QUERY_STATUS_MAX) as u16;
        search.sent_to.iter().map(|&(addr, port)| QueryStatusUpdate { addr, port, muid, kept }).collect()
    }

    /// Allows at most `node_outdegree + 1` query emissions per reissue
    /// cycle (the +1 absorbs enqueue/transmission asymmetry).
    pub fn query_allowed(&self, handle: SearchHandle, emitted_this_cycle: u32, node_outdegree: u32) -> bool {
        self.searches.get(handle).is_some() && emitted_this_cycle < node_outdegree + 1
    }

    /// Computes the reissue interval before a passive search is re-sent.
    pub fn reissue_interval(reissue_timeout_secs: u64, items_shown: u32, max_results: u32) -> Duration {
        let base = reissue_timeout_secs.max(SEARCH_MIN_RETRY_SECS);
        if max_results == 0 {
            return Duration::from_secs(base);
        }
        let percent = items_shown as f64 * 100.0 / max_results as f64;
        let factor = if percent >= 10.0 { 1.0 + (percent - 10.0).powi(2) / 550.0 } else { 1.0 };
        Duration::from_secs((base as f64 * factor) as u64)
    }
}

impl Default for SearchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guid(seed: u8) -> Guid {
        Guid([seed; 16])
    }

    #[test]
    fn starting_an_active_search_mints_its_first_muid() {
        let mut registry = SearchRegistry::new();
        let handle = registry.create("hello", 0, 1, 1800, SearchKind::Active, 255);
        registry.start(handle, || Some(guid(1)));
        assert!(registry.get(handle).unwrap().is_active());
        assert_eq!(registry.search_for_muid(&guid(1)), Some(handle));
    }

    #[test]
    fn closing_a_search_purges_its_muids() {
        let mut registry = SearchRegistry::new();
        let handle = registry.create("hello", 0, 1, 1800, SearchKind::Active, 255);
        registry.start(handle, || Some(guid(1)));
        registry.close(handle);
        assert_eq!(registry.search_for_muid(&guid(1)), None);
    }

    #[test]
    fn expired_search_is_not_reissued() {
        let mut registry = SearchRegistry::new();
        let handle = registry.create("hello", 0, 1, 1800, SearchKind::Active, 255);
        registry.start(handle, || Some(guid(1)));
        let mut called = false;
        registry.reissue(handle, 999_999, || {
            called = true;
            Some(guid(2))
        });
        assert!(!called);
    }

    #[test]
    fn reissue_interval_grows_past_ten_percent_shown() {
        let low = SearchRegistry::reissue_interval(1800, 5, 100);
        let high = SearchRegistry::reissue_interval(1800, 50, 100);
        assert!(high > low);
        assert_eq!(low, Duration::from_secs(1800));
    }

    #[test]
    fn leaf_search_reports_capped_kept_count_to_sent_to_ultrapeers() {
        let mut registry = SearchRegistry::new();
        let handle = registry.create("hello", 0, 1, 1800, SearchKind::Active, 255);
        registry.start(handle, || Some(guid(1)));
        registry.note_sent_to(handle, Ipv4Addr::new(198, 51, 100, 1), 6346);
        registry.note_sent_to(handle, Ipv4Addr::new(198, 51, 100, 2), 6347);

        let updates = registry.kept(handle, 5, true);
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|u| u.kept == 5 && u.muid == guid(1)));
    }

    #[test]
    fn kept_count_is_capped_at_query_status_max() {
        let mut registry = SearchRegistry::new();
        let handle = registry.create("hello", 0, 1, 1800, SearchKind::Active, 255);
        registry.start(handle, || Some(guid(1)));
        registry.note_sent_to(handle, Ipv4Addr::new(198, 51, 100, 1), 6346);

        let updates = registry.kept(handle, u32::MAX, true);
        assert_eq!(updates[0].kept, QUERY_STATUS_MAX as u16);
    }

    #[test]
    fn non_leaf_kept_emits_no_status_updates() {
        let mut registry = SearchRegistry::new();
        let handle = registry.create("hello", 0, 1, 1800, SearchKind::Active, 255);
        registry.start(handle, || Some(guid(1)));
        registry.note_sent_to(handle, Ipv4Addr::new(198, 51, 100, 1), 6346);

        let updates = registry.kept(handle, 5, false);
        assert!(updates.is_empty());
        assert_eq!(registry.get(handle).unwrap().kept_results, 5);
    }

    #[test]
    fn reissue_clears_the_sent_to_set() {
        let mut registry = SearchRegistry::new();
        let handle = registry.create("hello", 0, 1, 1800, SearchKind::Active, 255);
        registry.start(handle, || Some(guid(1)));
        registry.note_sent_to(handle, Ipv4Addr::new(198, 51, 100, 1), 6346);
        registry.reissue(handle, 10, || Some(guid(2)));
        assert!(registry.get(handle).unwrap().sent_to.is_empty());
    }

    #[test]
    fn query_allowed_respects_outdegree_plus_one() {
        let mut registry = SearchRegistry::new();
        let handle = registry.create("hello", 0, 1, 1800, SearchKind::Active, 255);
        assert!(registry.query_allowed(handle, 2, 2));
        assert!(!registry.query_allowed(handle, 3, 2));
    }
}
