//! list → fetch → delete → load, with a staging directory in between.

mod actions;
mod context;
mod lister;
mod orchestrator;

pub use actions::{DeleteAction, FetchAction, LoadAction};
pub use context::{SyncContext, SyncOptions, DEFAULT_CONCURRENCY};
pub use lister::list_tables;
pub use orchestrator::{Orchestrator, SyncRun, SyncState};
