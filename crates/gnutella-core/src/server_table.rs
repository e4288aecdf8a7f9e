//! ServerTable: the arena of `DownloadServer`s, indexed by
//! (GUID, addr, port) and by (addr, port) alone, bucketed by `retry_after`
//! for the scheduler's sweep.
//!
//! The Download↔DownloadServer reference cycle is broken by giving each
//! server a dense [`ServerId`] (a `slotmap` key) instead of a raw
//! reference; a `Download` holds that id plus its list/position.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use gnutella_dtyp::Guid;
use slotmap::{new_key_type, SlotMap};

use crate::download::DownloadId;

new_key_type! { pub struct ServerId; }

pub const DHASH_SIZE: usize = 1024;
pub const DOWNLOAD_SERVER_HOLD_SECS: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerFlags {
    pub push_ignored: bool,
    pub banning: bool,
    pub minimal_http: bool,
    pub fake_g2: bool,
    pub no_http_1_1: bool,
    pub dns_lookup_pending: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PushProxy {
    pub addr: Ipv4Addr,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DownloadServer {
    pub guid: Guid,
    pub addr: Ipv4Addr,
    pub port: u16,
    pub waiting: Vec<DownloadId>,
    pub running: Vec<DownloadId>,
    pub stopped: Vec<DownloadId>,
    pub flags: ServerFlags,
    pub hostname: Option<String>,
    pub push_proxies: Vec<PushProxy>,
    pub push_proxy_stamp_secs: u64,
    pub country: Option<String>,
    pub retry_after_secs: u64,
    pub removed: bool,
    pub refcount: u32,
}

impl DownloadServer {
    fn new(guid: Guid, addr: Ipv4Addr, port: u16) -> Self {
        DownloadServer {
            guid,
            addr,
            port,
            waiting: Vec::new(),
            running: Vec::new(),
            stopped: Vec::new(),
            flags: ServerFlags::default(),
            hostname: None,
            push_proxies: Vec::new(),
            push_proxy_stamp_secs: 0,
            country: None,
            retry_after_secs: 0,
            removed: false,
            refcount: 0,
        }
    }

    fn is_routable(&self) -> bool {
        !self.addr.is_unspecified() && !self.addr.is_broadcast() && self.port != 0
    }

    /// Total downloads tracked for this server across all three lists.
    pub fn total_downloads(&self) -> usize {
        self.waiting.len() + self.running.len() + self.stopped.len()
    }

    /// Two-phase reclamation is only safe once a server carries nothing.
    pub fn is_reclaimable(&self) -> bool {
        self.removed && self.total_downloads() == 0 && self.refcount == 0
    }
}

fn bucket_of(retry_after_secs: u64) -> usize {
    (retry_after_secs as usize).wrapping_mul(2654435761) % DHASH_SIZE
}

pub struct ServerTable {
    servers: SlotMap<ServerId, DownloadServer>,
    by_host: HashMap<(Guid, Ipv4Addr, u16), ServerId>,
    by_addr: HashMap<(Ipv4Addr, u16), ServerId>,
    by_time: Vec<Vec<ServerId>>,
    bucket_changes: Vec<u64>,
    removed_list: Vec<ServerId>,
}

impl ServerTable {
    pub fn new() -> Self {
        ServerTable {
            servers: SlotMap::with_key(),
            by_host: HashMap::new(),
            by_addr: HashMap::new(),
            by_time: (0..DHASH_SIZE).map(|_| Vec::new()).collect(),
            bucket_changes: vec![0; DHASH_SIZE],
            removed_list: Vec::new(),
        }
    }

    pub fn get(&self, id: ServerId) -> Option<&DownloadServer> {
        self.servers.get(id)
    }

    pub fn get_mut(&mut self, id: ServerId) -> Option<&mut DownloadServer> {
        self.servers.get_mut(id)
    }

    /// Inserts a server, or "undeletes" an existing removed one with the
    /// same key (two-phase reclamation).
    pub fn insert(&mut self, guid: Guid, addr: Ipv4Addr, port: u16) -> ServerId {
        let host_key = (guid, addr, port);
        if let Some(&existing) = self.by_host.get(&host_key) {
            if let Some(server) = self.servers.get_mut(existing) {
                server.removed = false;
            }
            self.removed_list.retain(|&id| id != existing);
            return existing;
        }

        let server = DownloadServer::new(guid, addr, port);
        let routable = server.is_routable();
        let id = self.servers.insert(server);
        self.by_host.insert(host_key, id);
        if routable {
            // Newest server wins the (addr, port) key on conflict.
            self.by_addr.insert((addr, port), id);
        }
        self.place_in_bucket(id, 0);
        id
    }

    fn place_in_bucket(&mut self, id: ServerId, retry_after_secs: u64) {
        let bucket = bucket_of(retry_after_secs);
        self.by_time[bucket].push(id);
        self.bucket_changes[bucket] += 1;
    }

    /// Updates `retry_after`, enforcing the floor `now + hold`, and
    /// re-buckets the server.
    pub fn set_retry_after(&mut self, id: ServerId, now_secs: u64, hold_secs: u64) {
        let floor = now_secs + hold_secs;
        let Some(server) = self.servers.get_mut(id) else { return };
        let old_bucket = bucket_of(server.retry_after_secs);
        server.retry_after_secs = server.retry_after_secs.max(floor);
        let new_retry = server.retry_after_secs;

        self.by_time[old_bucket].retain(|&sid| sid != id);
        self.bucket_changes[old_bucket] += 1;
        self.place_in_bucket(id, new_retry);
    }

    /// Snapshot of a bucket's change counter, for the scheduler's
    /// mutated-during-iteration restart check.
    pub fn bucket_change_counter(&self, retry_after_secs: u64) -> u64 {
        self.bucket_changes[bucket_of(retry_after_secs)]
    }

    pub fn servers_due(&self, now_secs: u64) -> Vec<ServerId> {
        self.by_time
            .iter()
            .flatten()
            .copied()
            .filter(|&id| self.servers.get(id).is_some_and(|s| s.retry_after_secs <= now_secs && !s.removed))
            .collect()
    }

    /// Reassigns `id` to `new_addr`; if another server already keys to
    /// that GUID+address or bare address, downloads are reparented onto
    /// the surviving server and the duplicate is queued for delayed
    /// reclaim.
    pub fn change_addr(&mut self, id: ServerId, new_addr: Ipv4Addr) {
        let Some(server) = self.servers.get(id).cloned() else { return };
        self.by_addr.retain(|_, &mut sid| sid != id);
        self.by_host.retain(|_, &mut sid| sid != id);

        let dup_by_host = self.by_host.get(&(server.guid, new_addr, server.port)).copied();
        let dup_by_addr = self.by_addr.get(&(new_addr, server.port)).copied();
        let duplicate = dup_by_host.or(dup_by_addr);

        if let Some(dup_id) = duplicate {
            if dup_id != id {
                log::debug!("server {id:?} reparented onto {dup_id:?} after address change to {new_addr}");
                self.reparent_downloads(id, dup_id);
                self.delete(id);
                return;
            }
        }

        if let Some(server) = self.servers.get_mut(id) {
            server.addr = new_addr;
        }
        self.by_host.insert((server.guid, new_addr, server.port), id);
        if !server.guid.is_blank() || server.port != 0 {
            self.by_addr.insert((new_addr, server.port), id);
        }
    }

    fn reparent_downloads(&mut self, from: ServerId, to: ServerId) {
        let Some(moved) = self.servers.get_mut(from).map(|s| {
            (
                std::mem::take(&mut s.waiting),
                std::mem::take(&mut s.running),
                std::mem::take(&mut s.stopped),
            )
        }) else {
            return;
        };
        if let Some(target) = self.servers.get_mut(to) {
            target.waiting.extend(moved.0);
            target.running.extend(moved.1);
            target.stopped.extend(moved.2);
        }
    }

    /// Marks a server removed and queues it for reclamation; a later
    /// `insert` with the same key undeletes it.
    pub fn delete(&mut self, id: ServerId) {
        if let Some(server) = self.servers.get_mut(id) {
            server.removed = true;
        }
        self.removed_list.push(id);
    }

    /// Frees every removed server that is actually empty and unreferenced.
    pub fn reclaim(&mut self) {
        let mut still_pending = Vec::new();
        for id in self.removed_list.drain(..) {
            let reclaimable = self.servers.get(id).is_some_and(DownloadServer::is_reclaimable);
            if reclaimable {
                if let Some(server) = self.servers.remove(id) {
                    log::trace!("reclaimed server {id:?} ({}:{})", server.addr, server.port);
                    self.by_host.remove(&(server.guid, server.addr, server.port));
                    self.by_addr.retain(|_, &mut sid| sid != id);
                }
            } else {
                still_pending.push(id);
            }
        }
        self.removed_list = still_pending;
    }
}

impl Default for ServerTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent_for_the_same_key() {
        let mut table = ServerTable::new();
        let a = table.insert(Guid::BLANK, Ipv4Addr::new(1, 2, 3, 4), 6346);
        let b = table.insert(Guid::BLANK, Ipv4Addr::new(1, 2, 3, 4), 6346);
        assert_eq!(a, b);
    }

    #[test]
    fn set_retry_after_enforces_floor() {
        let mut table = ServerTable::new();
        let id = table.insert(Guid::BLANK, Ipv4Addr::new(1, 2, 3, 4), 6346);
        table.set_retry_after(id, 1000, DOWNLOAD_SERVER_HOLD_SECS);
        assert!(table.get(id).unwrap().retry_after_secs >= 1000 + DOWNLOAD_SERVER_HOLD_SECS);
    }

    #[test]
    fn delete_then_insert_undeletes() {
        let mut table = ServerTable::new();
        let id = table.insert(Guid::BLANK, Ipv4Addr::new(1, 2, 3, 4), 6346);
        table.delete(id);
        assert!(table.get(id).unwrap().removed);
        let reinserted = table.insert(Guid::BLANK, Ipv4Addr::new(1, 2, 3, 4), 6346);
        assert_eq!(reinserted, id);
        assert!(!table.get(id).unwrap().removed);
    }

    #[test]
    fn reclaim_only_frees_empty_unreferenced_servers() {
        let mut table = ServerTable::new();
        let id = table.insert(Guid::BLANK, Ipv4Addr::new(1, 2, 3, 4), 6346);
        table.get_mut(id).unwrap().refcount = 1;
        table.delete(id);
        table.reclaim();
        assert!(table.get(id).is_some());

        table.get_mut(id).unwrap().refcount = 0;
        table.reclaim();
        assert!(table.get(id).is_none());
    }
}
