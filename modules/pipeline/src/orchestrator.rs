//! Linear state machine driving one sync run.

use crate::actions::{DeleteAction, FetchAction, LoadAction};
use crate::context::SyncContext;
use crate::lister::list_tables;
use dbsync_core::{FailurePolicy, Phase, PhaseOutcome, PhaseRunner, Side, SyncError, TableSet};
use remote_exec::{Executor, Transport};
use staging::StagingArea;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    SourceConnected,
    Listed,
    Fetched,
    TargetConnected,
    Deleted,
    Loaded,
    Done,
    Failed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::Idle => "idle",
            SyncState::SourceConnected => "source-connected",
            SyncState::Listed => "listed",
            SyncState::Fetched => "fetched",
            SyncState::TargetConnected => "target-connected",
            SyncState::Deleted => "deleted",
            SyncState::Loaded => "loaded",
            SyncState::Done => "done",
            SyncState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a run did: the states it passed through, its table set, one outcome
/// per phase that ran, and the fatal error if it ended in `Failed`.
#[derive(Debug)]
pub struct SyncRun {
    pub state: SyncState,
    pub history: Vec<SyncState>,
    pub tables: TableSet,
    pub phases: Vec<PhaseOutcome>,
    pub staging_dir: Option<PathBuf>,
    pub error: Option<SyncError>,
}

impl SyncRun {
    fn new() -> Self {
        SyncRun {
            state: SyncState::Idle,
            history: vec![SyncState::Idle],
            tables: TableSet::default(),
            phases: Vec::new(),
            staging_dir: None,
            error: None,
        }
    }

    /// Every (phase, table) that failed, in phase order.
    pub fn failed_tables(&self) -> Vec<(Phase, &str)> {
        self.phases
            .iter()
            .flat_map(|p| p.failed_tables().map(move |t| (p.phase, t)))
            .collect()
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn is_done(&self) -> bool {
        self.state == SyncState::Done
    }
}

pub struct Orchestrator {
    ctx: Arc<SyncContext>,
    transport: Arc<dyn Transport>,
    run: SyncRun,
}

impl Orchestrator {
    pub fn new(ctx: SyncContext, transport: Arc<dyn Transport>) -> Self {
        Orchestrator { ctx: Arc::new(ctx), transport, run: SyncRun::new() }
    }

    /// Drive the run to `Done` or `Failed`. The staging directory, once created,
    /// is removed on every path out.
    pub async fn run(mut self, started_unix: u64) -> SyncRun {
        info!(from = %self.ctx.source.name, to = %self.ctx.target.name, "sync started");
        match self.execute(started_unix).await {
            Ok(()) => {
                self.advance(SyncState::Done);
                let failed = self.run.failed_tables().len();
                if failed == 0 {
                    info!(tables = self.run.tables.len(), "sync finished");
                } else {
                    warn!(tables = self.run.tables.len(), failed, "sync finished with failed tables");
                }
            }
            Err(e) => {
                error!(state = %self.run.state, error = %e, "sync failed");
                self.advance(SyncState::Failed);
                self.run.error = Some(e);
            }
        }
        self.run
    }

    fn advance(&mut self, next: SyncState) {
        info!(from = %self.run.state, to = %next, "state changed");
        self.run.state = next;
        self.run.history.push(next);
    }

    async fn connect(&self, side: Side) -> Result<Arc<dyn Executor>, SyncError> {
        let endpoint = match side {
            Side::Source => &self.ctx.source,
            Side::Target => &self.ctx.target,
        };
        self.transport
            .connect(endpoint)
            .await
            .map_err(|source| SyncError::Connect { side, host: endpoint.ssh.host.clone(), source })
    }

    async fn execute(&mut self, started_unix: u64) -> Result<(), SyncError> {
        let source = self.connect(Side::Source).await?;
        self.advance(SyncState::SourceConnected);

        let staging = Arc::new(StagingArea::create(
            &self.ctx.options.staging_base,
            &self.ctx.source.database.name,
            started_unix,
        )?);
        self.run.staging_dir = Some(staging.path().to_path_buf());

        let result = self.phases(source, staging.clone()).await;
        if let Err(e) = staging.destroy() {
            warn!(dir = %staging.path().display(), error = %e, "failed to remove staging directory");
        }
        result
    }

    async fn phases(&mut self, source: Arc<dyn Executor>, staging: Arc<StagingArea>) -> Result<(), SyncError> {
        let tables = list_tables(source.as_ref(), &self.ctx, &staging).await?;
        self.run.tables = tables.clone();
        self.advance(SyncState::Listed);

        let fetch = FetchAction { ctx: self.ctx.clone(), source: source.clone(), staging: staging.clone() };
        let outcome = self
            .runner(Phase::Fetch, self.ctx.options.fetch_concurrency)
            .run(&tables, move |t| fetch.clone().run(t))
            .await;
        self.settle(outcome)?;
        self.advance(SyncState::Fetched);

        let target = self.connect(Side::Target).await?;
        self.advance(SyncState::TargetConnected);

        let delete = DeleteAction { ctx: self.ctx.clone(), target: target.clone() };
        let outcome = self
            .runner(Phase::Delete, self.ctx.options.delete_concurrency)
            .run(&tables, move |t| delete.clone().run(t))
            .await;
        self.settle(outcome)?;
        self.advance(SyncState::Deleted);

        let load = LoadAction { ctx: self.ctx.clone(), local: self.transport.local(), staging };
        let outcome = self
            .runner(Phase::Load, self.ctx.options.load_concurrency)
            .run(&tables, move |t| load.clone().run(t))
            .await;
        self.settle(outcome)?;
        self.advance(SyncState::Loaded);

        drop(source);
        drop(target);
        info!("released source and target sessions");
        Ok(())
    }

    fn runner(&self, phase: Phase, limit: usize) -> PhaseRunner {
        PhaseRunner::new(phase, limit)
            .with_timeout(self.ctx.options.task_timeout)
            .with_policy(self.ctx.options.failure_policy)
    }

    fn settle(&mut self, outcome: PhaseOutcome) -> Result<(), SyncError> {
        let (phase, failed) = (outcome.phase, outcome.failed.len());
        if failed > 0 {
            let tables: Vec<&str> = outcome.failed_tables().collect();
            warn!(phase = %phase, failed, tables = ?tables, "phase had failed tables");
        }
        self.run.phases.push(outcome);
        if failed > 0 && self.ctx.options.failure_policy == FailurePolicy::Abort {
            return Err(SyncError::PhaseAborted { phase, failed });
        }
        Ok(())
    }
}
