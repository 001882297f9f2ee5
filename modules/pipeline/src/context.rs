use dbsync_core::{Blacklist, Endpoint, FailurePolicy};
use remote_exec::CommandSet;
use std::path::PathBuf;
use std::time::Duration;

/// Sessions per phase when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 3;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Parent of the per-run `db_sync_<unix>` directory.
    pub staging_base: PathBuf,
    pub fetch_concurrency: usize,
    pub delete_concurrency: usize,
    pub load_concurrency: usize,
    /// Per-table limit; a task over it counts as a failed table.
    pub task_timeout: Option<Duration>,
    pub failure_policy: FailurePolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            staging_base: std::env::temp_dir(),
            fetch_concurrency: DEFAULT_CONCURRENCY,
            delete_concurrency: DEFAULT_CONCURRENCY,
            load_concurrency: DEFAULT_CONCURRENCY,
            task_timeout: None,
            failure_policy: FailurePolicy::Continue,
        }
    }
}

/// Everything one run needs, resolved up front and read-only afterwards.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub source: Endpoint,
    pub target: Endpoint,
    pub blacklist: Blacklist,
    pub commands: CommandSet,
    pub options: SyncOptions,
}
