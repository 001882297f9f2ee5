use crate::context::SyncContext;
use dbsync_core::{SyncError, TableSet};
use remote_exec::{redact, Executor};
use staging::StagingArea;
use tracing::{debug, info};

/// Run the listing command on the source once, persist its raw output, and
/// return the blacklist-filtered working set read back from the listing file.
pub async fn list_tables(source: &dyn Executor, ctx: &SyncContext, staging: &StagingArea) -> Result<TableSet, SyncError> {
    let db = &ctx.source.database;
    let command = ctx.commands.list_command(db).map_err(SyncError::Listing)?;
    debug!(host = %source.describe(), command = %redact(&command, &db.password), "listing tables");

    let raw = source.output(&command).await.map_err(SyncError::Listing)?;
    staging
        .write_listing(&raw)
        .await
        .map_err(|e| SyncError::staging(staging.listing_path(), e))?;

    let tables = staging
        .read_listing_lines(&ctx.blacklist)
        .await
        .map_err(|e| SyncError::staging(staging.listing_path(), e))?;
    info!(listed = line_count(&raw), selected = tables.len(), "table listing stored");
    Ok(tables)
}

fn line_count(raw: &[u8]) -> usize {
    String::from_utf8_lossy(raw).lines().count()
}
