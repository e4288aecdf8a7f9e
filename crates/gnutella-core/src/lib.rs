//! The Gnutella servent core: query routing, hit parsing, search
//! lifecycle management, and the swarmed/resumable HTTP download engine
//! built on top of `gnutella-msg`, `gnutella-ggep`, and
//! `gnutella-transport`.

pub mod browse_host;
pub mod chunk_planner;
pub mod config;
pub mod core;
pub mod download;
pub mod error;
pub mod fileinfo;
pub mod hit_parser;
pub mod http_downloader;
pub mod local_index;
pub mod muid;
pub mod persist;
pub mod push_client;
pub mod query_builder;
pub mod query_responder;
pub mod scheduler;
pub mod search_registry;
pub mod server_table;

pub mod testutil;

pub mod prelude {
    pub use crate::config::{Config, ConfigOverride};
    pub use crate::core::{Action, Core};
    pub use crate::download::{Chunk, Download, DownloadFlags, DownloadId, DownloadStatus};
    pub use crate::error::{CoreError, DropReason, Outcome, Result};
    pub use crate::fileinfo::{ChunkState, FileInfo, MemFileInfo};
    pub use crate::hit_parser::{HitParser, ParsedRecord, ResultFlags, ResultSet, TrailerStatus};
    pub use crate::local_index::{LocalIndex, MemLocalIndex, SharedFile};
    pub use crate::query_builder::{OobReplyAddr, PeerMode, QueryBuilder};
    pub use crate::query_responder::{MatchedHit, QueryResponder, RequesterInfo};
    pub use crate::scheduler::{Candidate, DownloadScheduler};
    pub use crate::search_registry::{Search, SearchHandle, SearchKind, SearchRegistry};
    pub use crate::server_table::{DownloadServer, ServerId, ServerTable};
}

pub use prelude::*;
