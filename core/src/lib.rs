//! Core types and the bounded phase runner shared by the sync modules.

pub mod error;
pub mod outcome;
pub mod profile;
pub mod runner;
pub mod tables;

pub use error::{ExecError, SyncError, TaskError};
pub use outcome::{FailurePolicy, Phase, PhaseOutcome, TableFailure};
pub use profile::{DatabaseProfile, Endpoint, Side, SshProfile};
pub use runner::PhaseRunner;
pub use tables::{is_safe_identifier, Blacklist, TableSet, RESERVED_TABLES};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
