//! Every tunable this crate's components read, gathered into one value.
//!
//! Layered-defaults-then-override: construct with [`Config::default`] and
//! apply a caller-supplied override on top. Loading an override from disk
//! is out of scope here, same as GUI config persistence — this struct
//! only carries values, never does I/O.

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // --- QueryResponder / duplicate suppression ---
    pub node_requery_threshold_secs: u64,
    pub min_word_length: usize,
    pub max_ttl: u8,
    pub max_replies: u8,

    // --- QueryBuilder ---
    pub muid_draw_attempts: u32,

    // --- SearchRegistry ---
    pub search_min_retry_secs: u64,
    pub oob_hostile_claim_threshold: u32,

    // --- ServerTable ---
    pub dhash_size: usize,
    pub download_server_hold_secs: u64,

    // --- DownloadScheduler ---
    pub max_downloads: usize,
    pub max_host_downloads: usize,

    // --- HttpDownloader ---
    pub hard_ttl_limit: u8,
    pub download_buffer_size: usize,
    pub download_buffer_read_ahead: usize,
    pub download_max_sink: usize,
    pub alt_loc_budget_bytes: usize,
    pub dl_mismatch_backout: usize,
    pub dl_remove_file_on_mismatch: bool,
    pub parq_cooldown_secs: u64,

    // --- PushClient ---
    pub download_retry_refused_delay_secs: u64,
    pub always_push_max_retries: u32,

    // --- Resource policy ---
    pub buffer_pool_max: usize,
    pub socket_buf_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_requery_threshold_secs: 180,
            min_word_length: 1,
            max_ttl: 7,
            max_replies: 255,

            muid_draw_attempts: 100,

            search_min_retry_secs: 1800,
            oob_hostile_claim_threshold: 3,

            dhash_size: 1024,
            download_server_hold_secs: 15,

            max_downloads: 20,
            max_host_downloads: 4,

            hard_ttl_limit: 7,
            download_buffer_size: 64 * 1024,
            download_buffer_read_ahead: 16 * 1024,
            download_max_sink: 16 * 1024,
            alt_loc_budget_bytes: 160,
            dl_mismatch_backout: 512,
            dl_remove_file_on_mismatch: false,
            parq_cooldown_secs: 1200,

            download_retry_refused_delay_secs: 60,
            always_push_max_retries: 5,

            buffer_pool_max: 300,
            socket_buf_size: 4096,
        }
    }
}

impl Config {
    /// Applies a sparse override on top of `self`, consuming both.
    pub fn overridden_by(self, over: ConfigOverride) -> Config {
        Config {
            node_requery_threshold_secs: over
                .node_requery_threshold_secs
                .unwrap_or(self.node_requery_threshold_secs),
            max_ttl: over.max_ttl.unwrap_or(self.max_ttl),
            max_replies: over.max_replies.unwrap_or(self.max_replies),
            max_downloads: over.max_downloads.unwrap_or(self.max_downloads),
            max_host_downloads: over.max_host_downloads.unwrap_or(self.max_host_downloads),
            ..self
        }
    }
}

/// A sparse set of overrides a caller may apply to [`Config::default`].
/// Only the fields callers most commonly tune are exposed here; extend as
/// needed rather than exposing every field up front.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverride {
    pub node_requery_threshold_secs: Option<u64>,
    pub max_ttl: Option<u8>,
    pub max_replies: Option<u8>,
    pub max_downloads: Option<usize>,
    pub max_host_downloads: Option<usize>,
}
