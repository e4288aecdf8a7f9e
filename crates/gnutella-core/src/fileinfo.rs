//! `FileInfo`: the external aggregate describing an on-disk download
//! target. The core only consumes this interface; [`MemFileInfo`] is
//! an in-memory implementation good enough to drive the scheduler,
//! planner, and downloader in tests and in the CLI demo — a real servent
//! backs this with the scanner's on-disk chunk bitmap instead.

use gnutella_dtyp::Sha1Digest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChunkState {
    Empty,
    Busy,
    Done,
}

/// A byte range `[start, end)` tagged with its chunk state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub start: u64,
    pub end: u64,
    pub state: ChunkState,
}

pub trait FileInfo {
    fn filesize(&self) -> Option<u64>;
    fn done_bytes(&self) -> u64;
    fn is_complete(&self) -> bool;

    /// First hole of at least `min_len` bytes that is entirely `Empty`.
    /// Returns `None` when no such hole exists (everything `Busy`/`Done`
    /// or the file is complete).
    fn find_empty_hole(&self, min_len: u64) -> Option<(u64, u64)>;

    /// Whether `[start, end)` is entirely `Done` already (used for overlap
    /// reuse decisions in PFSP mode).
    fn range_is_done(&self, start: u64, end: u64) -> bool;

    fn mark_range(&mut self, start: u64, end: u64, state: ChunkState);

    fn sha1(&self) -> Option<Sha1Digest>;
    fn set_cha1(&mut self, digest: Sha1Digest);
    fn cha1(&self) -> Option<Sha1Digest>;

    fn recvcount(&self) -> u32;
    fn lifecount(&self) -> u32;
    fn refcount(&self) -> u32;
    fn incref(&mut self);
    fn decref(&mut self);

    fn is_dirty(&self) -> bool;
    fn clear_dirty(&mut self);

    fn use_swarming(&self) -> bool;
}

/// In-memory [`FileInfo`] backed by a sorted, non-overlapping chunk list.
#[derive(Debug, Clone)]
pub struct MemFileInfo {
    filesize: Option<u64>,
    chunks: Vec<Chunk>,
    sha1: Option<Sha1Digest>,
    cha1: Option<Sha1Digest>,
    recvcount: u32,
    lifecount: u32,
    refcount: u32,
    dirty: bool,
    use_swarming: bool,
}

impl MemFileInfo {
    pub fn new(filesize: Option<u64>) -> Self {
        let chunks = match filesize {
            Some(size) if size > 0 => vec![Chunk { start: 0, end: size, state: ChunkState::Empty }],
            _ => Vec::new(),
        };
        MemFileInfo {
            filesize,
            chunks,
            sha1: None,
            cha1: None,
            recvcount: 0,
            lifecount: 0,
            refcount: 0,
            dirty: false,
            use_swarming: true,
        }
    }

    pub fn with_sha1(mut self, sha1: Sha1Digest) -> Self {
        self.sha1 = Some(sha1);
        self
    }

    pub fn with_swarming(mut self, use_swarming: bool) -> Self {
        self.use_swarming = use_swarming;
        self
    }

    fn rebuild(&mut self, mut new_chunks: Vec<Chunk>) {
        new_chunks.sort_by_key(|c| c.start);
        // Merge adjacent chunks that ended up with the same state.
        let mut merged: Vec<Chunk> = Vec::with_capacity(new_chunks.len());
        for chunk in new_chunks {
            if chunk.start == chunk.end {
                continue;
            }
            if let Some(last) = merged.last_mut() {
                if last.end == chunk.start && last.state == chunk.state {
                    last.end = chunk.end;
                    continue;
                }
            }
            merged.push(chunk);
        }
        self.chunks = merged;
    }
}

impl FileInfo for MemFileInfo {
    fn filesize(&self) -> Option<u64> {
        self.filesize
    }

    fn done_bytes(&self) -> u64 {
        self.chunks
            .iter()
            .filter(|c| c.state == ChunkState::Done)
            .map(|c| c.end - c.start)
            .sum()
    }

    fn is_complete(&self) -> bool {
        match self.filesize {
            Some(size) => size > 0 && self.done_bytes() == size,
            None => false,
        }
    }

    fn find_empty_hole(&self, min_len: u64) -> Option<(u64, u64)> {
        self.chunks
            .iter()
            .find(|c| c.state == ChunkState::Empty && c.end - c.start >= min_len)
            .map(|c| (c.start, c.end))
    }

    fn range_is_done(&self, start: u64, end: u64) -> bool {
        if start >= end {
            return true;
        }
        self.chunks
            .iter()
            .any(|c| c.state == ChunkState::Done && c.start <= start && c.end >= end)
    }

    fn mark_range(&mut self, start: u64, end: u64, state: ChunkState) {
        if start >= end {
            return;
        }
        let mut result = Vec::with_capacity(self.chunks.len() + 2);
        for chunk in &self.chunks {
            if chunk.end <= start || chunk.start >= end {
                result.push(*chunk);
                continue;
            }
            if chunk.start < start {
                result.push(Chunk { start: chunk.start, end: start, state: chunk.state });
            }
            if chunk.end > end {
                result.push(Chunk { start: end, end: chunk.end, state: chunk.state });
            }
        }
        result.push(Chunk { start, end, state });
        self.rebuild(result);
        self.dirty = true;
    }

    fn sha1(&self) -> Option<Sha1Digest> {
        self.sha1
    }

    fn set_cha1(&mut self, digest: Sha1Digest) {
        self.cha1 = Some(digest);
        self.dirty = true;
    }

    fn cha1(&self) -> Option<Sha1Digest> {
        self.cha1
    }

    fn recvcount(&self) -> u32 {
        self.recvcount
    }

    fn lifecount(&self) -> u32 {
        self.lifecount
    }

    fn refcount(&self) -> u32 {
        self.refcount
    }

    fn incref(&mut self) {
        self.refcount += 1;
        self.recvcount += 1;
        self.lifecount += 1;
    }

    fn decref(&mut self) {
        self.refcount = self.refcount.saturating_sub(1);
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn use_swarming(&self) -> bool {
        self.use_swarming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_file_is_one_empty_hole() {
        let info = MemFileInfo::new(Some(1000));
        assert_eq!(info.find_empty_hole(1), Some((0, 1000)));
        assert!(!info.is_complete());
    }

    #[test]
    fn marking_whole_file_done_completes_it() {
        let mut info = MemFileInfo::new(Some(1000));
        info.mark_range(0, 1000, ChunkState::Done);
        assert!(info.is_complete());
        assert_eq!(info.done_bytes(), 1000);
        assert_eq!(info.find_empty_hole(1), None);
    }

    #[test]
    fn marking_a_middle_range_splits_the_hole() {
        let mut info = MemFileInfo::new(Some(1000));
        info.mark_range(200, 400, ChunkState::Busy);
        assert_eq!(info.find_empty_hole(150), Some((400, 1000)));
        assert!(!info.range_is_done(200, 400));
    }

    #[test]
    fn adjacent_done_ranges_merge() {
        let mut info = MemFileInfo::new(Some(100));
        info.mark_range(0, 50, ChunkState::Done);
        info.mark_range(50, 100, ChunkState::Done);
        assert!(info.range_is_done(0, 100));
        assert!(info.is_complete());
    }
}
