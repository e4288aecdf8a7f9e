//! QueryResponder: validates an incoming Query, canonicalizes its
//! text, suppresses duplicates, applies OOB policy, and matches against a
//! `LocalIndex` to build a QueryHit.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use gnutella_dtyp::Guid;
use gnutella_ggep::tail::Extension;
use gnutella_msg::query::QueryPayload;

use crate::error::{DropReason, Outcome};
use crate::local_index::{LocalIndex, SharedFile};

const QTRAX2_SENTINEL: &str = "QTRAX2_CONNECTION";

/// Canonicalizes free-text query strings in place:
/// 1. Strip a UTF-8 BOM if present.
/// 2. Fold to lowercase; map punctuation/whitespace to single spaces; drop
///    bytes that don't decode as UTF-8 text.
/// 3. Collapse whitespace runs; drop words shorter than `min_word_length`.
pub fn canonicalize(input: &str, min_word_length: usize) -> String {
    let stripped = input.strip_prefix('\u{feff}').unwrap_or(input);

    let mut folded = String::with_capacity(stripped.len());
    for ch in stripped.chars() {
        if ch.is_alphanumeric() {
            folded.extend(ch.to_lowercase());
        } else {
            folded.push(' ');
        }
    }

    folded
        .split_whitespace()
        .filter(|word| word.chars().count() >= min_word_length)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequesterInfo {
    pub addr: Ipv4Addr,
    pub is_immediate_neighbour: bool,
    pub neighbour_listen_addr: Option<Ipv4Addr>,
    pub is_firewalled_leaf: bool,
    pub is_hostile: bool,
}

/// Per-neighbour-leaf and per-relayer duplicate suppression state.
pub struct QueryResponder {
    pub node_requery_threshold: Duration,
    pub min_word_length: usize,
    pub max_ttl: u8,
    pub max_replies: u8,

    per_leaf_seen: HashMap<String, Instant>,
    per_relayer_current: HashMap<String, ()>,
    per_relayer_previous: HashMap<String, ()>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedHit {
    pub records: Vec<SharedFile>,
    /// The OOB bit, possibly cleared in-place by this stage.
    pub oob_reply: bool,
}

impl QueryResponder {
    pub fn new(node_requery_threshold: Duration, min_word_length: usize, max_ttl: u8, max_replies: u8) -> Self {
        QueryResponder {
            node_requery_threshold,
            min_word_length,
            max_ttl,
            max_replies,
            per_leaf_seen: HashMap::new(),
            per_relayer_current: HashMap::new(),
            per_relayer_previous: HashMap::new(),
        }
    }

    /// Clears the "previous" relayer generation into history and starts a
    /// fresh "current" generation. Call periodically to bound memory
    /// (two-generation cache).
    pub fn rotate_relayer_generation(&mut self) {
        self.per_relayer_previous = std::mem::take(&mut self.per_relayer_current);
    }

    fn relayer_key(hops: u8, ttl: u8, query_text: &str) -> String {
        format!("{hops}/{ttl}{query_text}")
    }

    /// Runs the full validation pipeline and, if the query survives,
    /// matches it against `local_index`.
    #[allow(clippy::too_many_arguments)]
    pub fn respond(
        &mut self,
        query: &QueryPayload,
        extensions: &[Extension],
        hops: u8,
        ttl: u8,
        requester: RequesterInfo,
        local_index: &impl LocalIndex,
        now: Instant,
    ) -> Outcome<MatchedHit> {
        let raw_text = match query.query.as_str() {
            Ok(text) => text,
            Err(_) => return Outcome::DropWith(DropReason::MalformedUtf8),
        };

        if raw_text == QTRAX2_SENTINEL {
            return Outcome::DropWith(DropReason::BadResult);
        }

        let sha1_urns: Vec<&str> = extensions
            .iter()
            .filter_map(|e| match e {
                Extension::Huge(urn) => Some(urn.as_str()),
                _ => None,
            })
            .collect();
        let mut sha1_targets = Vec::new();
        for urn in &sha1_urns {
            match urn.parse::<gnutella_dtyp::Sha1Digest>() {
                Ok(digest) => sha1_targets.push(digest),
                Err(_) => return Outcome::DropWith(DropReason::MalformedSha1),
            }
        }

        // An empty/short query text still carries a match when a SHA-1 urn
        // was present; only drop on length when no urn backs the query.
        if sha1_targets.is_empty() {
            if raw_text.len() < 2 {
                return Outcome::DropWith(DropReason::QueryTooShort);
            }
            if raw_text.len() < 5 && hops > self.max_ttl / 2 {
                return Outcome::DropWith(DropReason::TooSmall);
            }
        }

        if extensions.iter().any(|e| matches!(e, Extension::Overhead(_))) {
            return Outcome::DropWith(DropReason::Overhead);
        }

        let canonical = canonicalize(raw_text, self.min_word_length);
        let dedup_key = if let Some(first) = sha1_targets.first() { first.to_urn() } else { canonical.clone() };

        if let Some(&last_seen) = self.per_leaf_seen.get(&dedup_key) {
            if now.saturating_duration_since(last_seen) < self.node_requery_threshold {
                return Outcome::DropWith(DropReason::Duplicate);
            }
        }
        self.per_leaf_seen.insert(dedup_key, now);

        let relayer_key = Self::relayer_key(hops, ttl, raw_text);
        if self.per_relayer_current.contains_key(&relayer_key)
            || self.per_relayer_previous.contains_key(&relayer_key)
        {
            return Outcome::DropWith(DropReason::Throttle);
        }
        self.per_relayer_current.insert(relayer_key, ());

        let mut oob_reply = query.speed.oob_reply();
        if oob_reply {
            if requester.is_hostile {
                return Outcome::DropWith(DropReason::HostileIp);
            }
            if requester.is_immediate_neighbour {
                if let Some(listen_addr) = requester.neighbour_listen_addr {
                    if listen_addr != requester.addr {
                        return Outcome::DropWith(DropReason::BadReturnAddress);
                    }
                }
            }
            if requester.is_firewalled_leaf {
                oob_reply = false;
            }
        }

        let mut records = Vec::new();
        for sha1 in &sha1_targets {
            if let Some(file) = local_index.by_sha1(sha1) {
                records.push(file.clone());
            }
        }
        if !(canonical.is_empty() && sha1_targets.is_empty()) {
            for file in local_index.by_text(&canonical) {
                if !records.iter().any(|r| r.file_index == file.file_index) {
                    records.push(file.clone());
                }
            }
        }
        records.truncate(self.max_replies as usize);

        Outcome::Continue(MatchedHit { records, oob_reply })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_index::MemLocalIndex;
    use gnutella_msg::query::SpeedFlags;

    fn requester() -> RequesterInfo {
        RequesterInfo {
            addr: Ipv4Addr::new(198, 51, 100, 1),
            is_immediate_neighbour: false,
            neighbour_listen_addr: None,
            is_firewalled_leaf: false,
            is_hostile: false,
        }
    }

    #[test]
    fn canonicalizes_punctuation_and_case() {
        assert_eq!(canonicalize("  Hello, World!!  ", 1), "hello world");
    }

    #[test]
    fn drops_words_shorter_than_minimum() {
        assert_eq!(canonicalize("a bb ccc", 2), "bb ccc");
    }

    #[test]
    fn too_short_query_is_dropped() {
        let mut responder = QueryResponder::new(Duration::from_secs(180), 1, 7, 255);
        let query = QueryPayload::new("x", SpeedFlags::new());
        let index = MemLocalIndex::new();
        let outcome = responder.respond(&query, &[], 0, 7, requester(), &index, Instant::now());
        assert_eq!(outcome, Outcome::DropWith(DropReason::QueryTooShort));
    }

    #[test]
    fn repeated_identical_query_within_threshold_is_duplicate() {
        let mut responder = QueryResponder::new(Duration::from_secs(180), 1, 7, 255);
        let query = QueryPayload::new("hello world", SpeedFlags::new());
        let index = MemLocalIndex::new();
        let now = Instant::now();
        let first = responder.respond(&query, &[], 0, 7, requester(), &index, now);
        assert!(matches!(first, Outcome::Continue(_)));
        let second = responder.respond(&query, &[], 0, 7, requester(), &index, now);
        assert_eq!(second, Outcome::DropWith(DropReason::Duplicate));
    }

    #[test]
    fn empty_text_query_with_sha1_urn_is_not_dropped_as_too_short() {
        let mut responder = QueryResponder::new(Duration::from_secs(180), 1, 7, 255);
        let query = QueryPayload::new("", SpeedFlags::new());
        let mut index = MemLocalIndex::new();
        index.add(crate::local_index::SharedFile {
            file_index: 0,
            name: "moby dick.txt".to_string(),
            size: 8432,
            sha1: Some(gnutella_dtyp::Sha1Digest([0xAA; 20])),
        });
        let urn = gnutella_dtyp::Sha1Digest([0xAA; 20]).to_urn();
        let outcome = responder.respond(
            &query,
            &[Extension::Huge(urn)],
            0,
            7,
            requester(),
            &index,
            Instant::now(),
        );
        let Outcome::Continue(hit) = outcome else { panic!("expected Continue") };
        assert_eq!(hit.records.len(), 1);
    }

    #[test]
    fn overhead_extension_is_dropped() {
        let mut responder = QueryResponder::new(Duration::from_secs(180), 1, 7, 255);
        let query = QueryPayload::new("hello world", SpeedFlags::new());
        let index = MemLocalIndex::new();
        let outcome = responder.respond(
            &query,
            &[Extension::Overhead(vec![1, 2, 3])],
            0,
            7,
            requester(),
            &index,
            Instant::now(),
        );
        assert_eq!(outcome, Outcome::DropWith(DropReason::Overhead));
    }
}
