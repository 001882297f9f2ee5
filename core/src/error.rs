//! Error taxonomy: run-fatal setup errors, per-table task errors, command errors.

use crate::outcome::Phase;
use crate::profile::Side;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single command run through an executor.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("private key {path}: {source}")]
    Key {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing unsafe identifier {0:?}")]
    UnsafeIdentifier(String),
}

/// Failure of one table's action inside a phase. Never fatal to the run on its own.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("staging I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("skipped after an earlier failure in this phase")]
    Skipped,

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to connect to {side} host {host}: {source}")]
    Connect {
        side: Side,
        host: String,
        #[source]
        source: ExecError,
    },

    #[error("failed to list source tables: {0}")]
    Listing(#[source] ExecError),

    #[error("staging directory {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{phase} phase aborted: {failed} table(s) failed")]
    PhaseAborted { phase: Phase, failed: usize },
}

impl SyncError {
    pub fn staging(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Staging { path: path.into(), source }
    }
}
