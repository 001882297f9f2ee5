//! The per-table work of the fetch, delete and load phases.

use crate::context::SyncContext;
use dbsync_core::TaskError;
use remote_exec::{redact, Executor};
use staging::StagingArea;
use std::sync::Arc;
use tracing::debug;

/// Dump one source table into its staging file.
#[derive(Clone)]
pub struct FetchAction {
    pub ctx: Arc<SyncContext>,
    pub source: Arc<dyn Executor>,
    pub staging: Arc<StagingArea>,
}

impl FetchAction {
    pub async fn run(self, table: String) -> Result<(), TaskError> {
        let db = &self.ctx.source.database;
        let command = self.ctx.commands.dump_command(db, &table)?;
        debug!(command = %redact(&command, &db.password), "dumping");
        let rows = self.source.output(&command).await?;
        self.staging.write_table_dump(&table, &rows).await?;
        Ok(())
    }
}

/// Empty one target table.
#[derive(Clone)]
pub struct DeleteAction {
    pub ctx: Arc<SyncContext>,
    pub target: Arc<dyn Executor>,
}

impl DeleteAction {
    pub async fn run(self, table: String) -> Result<(), TaskError> {
        let db = &self.ctx.target.database;
        let command = self.ctx.commands.delete_command(db, &table)?;
        debug!(command = %redact(&command, &db.password), "deleting rows");
        self.target.run(&command).await?;
        Ok(())
    }
}

/// Bulk-load one staged dump into the target through the local channel.
#[derive(Clone)]
pub struct LoadAction {
    pub ctx: Arc<SyncContext>,
    pub local: Arc<dyn Executor>,
    pub staging: Arc<StagingArea>,
}

impl LoadAction {
    pub async fn run(self, table: String) -> Result<(), TaskError> {
        let file = self.staging.dump_path(&table);
        // A table whose fetch failed has no dump; fail here rather than load nothing.
        tokio::fs::metadata(&file).await?;

        let db = &self.ctx.target.database;
        let command = self.ctx.commands.load_command(db, &self.ctx.target.ssh.host, &table, &file)?;
        debug!(command = %redact(&command, &db.password), "loading");
        self.local.run(&command).await?;
        Ok(())
    }
}
