//! Bounded per-table task execution for one phase.

use crate::error::TaskError;
use crate::outcome::{FailurePolicy, Phase, PhaseOutcome};
use crate::tables::TableSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, info_span, warn, Instrument};

/// Runs one action per table with at most `limit` actions in flight.
///
/// Every table is spawned as its own task; a task holds its slot for the whole
/// action, so `limit` bounds open sessions and not just scheduled work. `run`
/// returns only after every task is terminal and yields one outcome per table,
/// in table-set order.
#[derive(Debug, Clone)]
pub struct PhaseRunner {
    phase: Phase,
    limit: usize,
    task_timeout: Option<Duration>,
    policy: FailurePolicy,
}

impl PhaseRunner {
    pub fn new(phase: Phase, limit: usize) -> Self {
        let limit = limit.clamp(1, Semaphore::MAX_PERMITS);
        PhaseRunner { phase, limit, task_timeout: None, policy: FailurePolicy::Continue }
    }

    /// Fail a table's task once its action runs longer than `limit`.
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.task_timeout = limit;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn run<F, Fut>(&self, tables: &TableSet, action: F) -> PhaseOutcome
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let started = Instant::now();
        info!(phase = %self.phase, tables = tables.len(), limit = self.limit, "phase started");

        let slots = Arc::new(Semaphore::new(self.limit));
        let halted = Arc::new(AtomicBool::new(false));
        let action = Arc::new(action);
        let abort = self.policy == FailurePolicy::Abort;

        let mut handles = Vec::with_capacity(tables.len());
        for table in tables.iter() {
            let slots = slots.clone();
            let halted = halted.clone();
            let action = action.clone();
            let task_timeout = self.task_timeout;
            let name = table.to_string();
            let span = info_span!("task", phase = %self.phase, table = %table);
            let handle = tokio::spawn(
                async move {
                    let _slot = slots.acquire_owned().await.map_err(|_| TaskError::Skipped)?;
                    if halted.load(Ordering::Acquire) {
                        debug!("table skipped");
                        return Err(TaskError::Skipped);
                    }
                    debug!("table started");
                    let began = Instant::now();
                    let result = match task_timeout {
                        Some(limit) => match timeout(limit, (*action)(name)).await {
                            Ok(result) => result,
                            Err(_) => Err(TaskError::TimedOut(limit)),
                        },
                        None => (*action)(name).await,
                    };
                    let elapsed_ms = began.elapsed().as_millis() as u64;
                    match &result {
                        Ok(()) => info!(elapsed_ms, "table completed"),
                        Err(e) => {
                            if abort {
                                halted.store(true, Ordering::Release);
                            }
                            warn!(elapsed_ms, error = %e, "table failed");
                        }
                    }
                    result
                }
                .instrument(span),
            );
            handles.push((table.to_string(), handle));
        }

        let mut outcome = PhaseOutcome::new(self.phase);
        for (table, handle) in handles {
            let result = handle.await.unwrap_or_else(|e| Err(TaskError::Panicked(e.to_string())));
            outcome.record(table, result);
        }
        outcome.elapsed = started.elapsed();

        info!(
            phase = %self.phase,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "phase finished"
        );
        outcome
    }
}
