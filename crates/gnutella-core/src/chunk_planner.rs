//! ChunkPlanner: decides the next byte range a Download should request,
//! in each of the three download modes.

use crate::download::Chunk;
use crate::fileinfo::FileInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Request this range next.
    Request(Chunk),
    /// No hole is free right now; retry after this many seconds.
    RequeueAfter(u64),
    /// The file is already fully accounted for.
    FileComplete,
}

pub struct ChunkPlanner {
    pub overlap_bytes: u64,
    pub busy_retry_delay_secs: u64,
}

impl ChunkPlanner {
    pub fn new(overlap_bytes: u64, busy_retry_delay_secs: u64) -> Self {
        ChunkPlanner { overlap_bytes, busy_retry_delay_secs }
    }

    /// Non-swarming mode: always continues from wherever the last byte
    /// landed, to the end of the file (or open-ended if size is unknown).
    /// Resuming past the start re-requests `overlap_bytes` of already-done
    /// data so the downloader can verify the seam.
    pub fn plan_non_swarming(&self, pos: u64, known_size: Option<u64>) -> PlanOutcome {
        let range_end = known_size.unwrap_or(0);
        let overlap = if pos > self.overlap_bytes { self.overlap_bytes } else { 0 };
        let skip = pos - overlap;
        PlanOutcome::Request(Chunk { skip, pos: skip, size: known_size.map(|s| s.saturating_sub(skip)), overlap, range_end })
    }

    /// Swarming mode: grabs the first empty hole from `file_info`. An
    /// overlap is requested at the hole's start when a neighbouring
    /// `Done` region precedes it, so the downloader can verify the seam.
    pub fn plan_swarming(&self, file_info: &impl FileInfo, min_chunk: u64) -> PlanOutcome {
        if file_info.is_complete() {
            return PlanOutcome::FileComplete;
        }
        match file_info.find_empty_hole(min_chunk) {
            Some((start, end)) => {
                let overlap = if start > 0 && file_info.range_is_done(start.saturating_sub(self.overlap_bytes), start) {
                    self.overlap_bytes.min(start)
                } else {
                    0
                };
                let skip = start.saturating_sub(overlap);
                PlanOutcome::Request(Chunk { skip, pos: skip, size: Some(end - skip), overlap, range_end: end })
            }
            None => PlanOutcome::RequeueAfter(self.busy_retry_delay_secs),
        }
    }

    /// PFSP mode: intersects the remote's advertised available ranges
    /// with our own empty holes, reusing an overlap only when it avoids
    /// re-requesting a range the remote has just told us it now has.
    pub fn plan_pfsp(
        &self,
        file_info: &impl FileInfo,
        available_ranges: &[(u64, u64)],
        min_chunk: u64,
    ) -> PlanOutcome {
        if file_info.is_complete() {
            return PlanOutcome::FileComplete;
        }
        let Some((hole_start, hole_end)) = file_info.find_empty_hole(min_chunk) else {
            return PlanOutcome::RequeueAfter(self.busy_retry_delay_secs);
        };

        for &(avail_start, avail_end) in available_ranges {
            let start = hole_start.max(avail_start);
            let end = hole_end.min(avail_end);
            if start < end && end - start >= min_chunk.min(hole_end - hole_start) {
                let overlap = if start > 0 && file_info.range_is_done(start.saturating_sub(self.overlap_bytes), start) {
                    self.overlap_bytes.min(start)
                } else {
                    0
                };
                let skip = start.saturating_sub(overlap);
                return PlanOutcome::Request(Chunk { skip, pos: skip, size: Some(end - skip), overlap, range_end: end });
            }
        }
        PlanOutcome::RequeueAfter(self.busy_retry_delay_secs)
    }
}
