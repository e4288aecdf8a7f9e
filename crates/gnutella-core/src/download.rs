//! The `Download` record: a single source for one file, plus the
//! state machine [`HttpDownloader`](crate::http_downloader) drives it
//! through.

use gnutella_dtyp::Sha1Digest;
use slotmap::new_key_type;

use crate::server_table::ServerId;

new_key_type! { pub struct DownloadId; }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Queued,
    Connecting,
    PushSent,
    ReqSending,
    ReqSent,
    Headers,
    Sinking,
    Receiving,
    TimeoutWait,
    Completed,
    Aborted,
    Error,
    VerifyWait,
    Verifying,
    Verified,
    MoveWait,
    Moving,
    Done,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Chunk {
    pub skip: u64,
    pub pos: u64,
    pub size: Option<u64>,
    pub overlap: u64,
    pub range_end: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadFlags {
    pub overlapped: bool,
    pub shrunk_reply: bool,
    pub push_ignored: bool,
    pub suspended: bool,
    pub active_queued: bool,
    pub passive_queued: bool,
    pub chunk_chosen: bool,
    pub sunk_data: bool,
    pub transient: bool,
    pub browse: bool,
    pub replied: bool,
    pub dns_lookup: bool,
    pub uri_res: bool,
}

#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub uri: Option<String>,
    pub sha1: Option<Sha1Digest>,
    pub record_index: u32,
    pub server: ServerId,
    pub status: DownloadStatus,
    pub chunk: Chunk,
    pub served_reqs: u32,
    pub retries: u32,
    pub retry_after_secs: u64,
    pub timeout_delay_secs: u64,
    pub last_update_secs: u64,
    pub flags: DownloadFlags,
}

impl Download {
    pub fn new(file_name: impl Into<String>, record_index: u32, server: ServerId) -> Self {
        Download {
            file_name: file_name.into(),
            uri: None,
            sha1: None,
            record_index,
            server,
            status: DownloadStatus::Queued,
            chunk: Chunk::default(),
            served_reqs: 0,
            retries: 0,
            retry_after_secs: 0,
            timeout_delay_secs: 60,
            last_update_secs: 0,
            flags: DownloadFlags::default(),
        }
    }

    /// `download_abort`: idempotent, transitions any non-terminal
    /// state to `Aborted`.
    pub fn abort(&mut self) {
        if !matches!(
            self.status,
            DownloadStatus::Aborted | DownloadStatus::Done | DownloadStatus::Removed
        ) {
            self.status = DownloadStatus::Aborted;
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            DownloadStatus::Completed
                | DownloadStatus::Aborted
                | DownloadStatus::Error
                | DownloadStatus::Done
                | DownloadStatus::Removed
        )
    }
}
