//! Phases and their per-table outcomes.

use crate::error::TaskError;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    List,
    Fetch,
    Delete,
    Load,
}

impl Phase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Phase::List => "list",
            Phase::Fetch => "fetch",
            Phase::Delete => "delete",
            Phase::Load => "load",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a phase does when one of its tables fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure and keep going; the run still reaches `Done`.
    #[default]
    Continue,
    /// Skip the phase's not-yet-started tables and fail the run once it drains.
    Abort,
}

#[derive(Debug)]
pub struct TableFailure {
    pub table: String,
    pub error: TaskError,
}

/// Aggregated result of one phase: exactly one entry per table.
#[derive(Debug)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub succeeded: Vec<String>,
    pub failed: Vec<TableFailure>,
    pub elapsed: Duration,
}

impl PhaseOutcome {
    pub fn new(phase: Phase) -> Self {
        PhaseOutcome { phase, succeeded: Vec::new(), failed: Vec::new(), elapsed: Duration::ZERO }
    }

    pub fn record(&mut self, table: String, result: Result<(), TaskError>) {
        match result {
            Ok(()) => self.succeeded.push(table),
            Err(error) => self.failed.push(TableFailure { table, error }),
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_tables(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|f| f.table.as_str())
    }
}
