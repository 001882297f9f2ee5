use dbsync_core::PhaseOutcome;
use pipeline::SyncRun;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub run_id: Uuid,
    pub tool_version: String,
    pub from: String,
    pub to: String,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedTable {
    pub table: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: String,
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedTable>,
    pub elapsed_ms: u64,
}

impl From<&PhaseOutcome> for PhaseReport {
    fn from(o: &PhaseOutcome) -> Self {
        PhaseReport {
            phase: o.phase.to_string(),
            succeeded: o.succeeded.clone(),
            failed: o
                .failed
                .iter()
                .map(|f| FailedTable { table: f.table.clone(), error: f.error.to_string() })
                .collect(),
            elapsed_ms: o.elapsed.as_millis() as u64,
        }
    }
}

/// One (phase, table) result, the unit of JSONL and CSV output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TableRow {
    pub phase: String,
    pub table: String,
    pub status: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub meta: RunMeta,
    pub state: String,
    pub staging_dir: Option<String>,
    pub tables: Vec<String>,
    pub phases: Vec<PhaseReport>,
    pub error: Option<String>,
}

impl RunReport {
    pub fn from_run(meta: RunMeta, run: &SyncRun) -> Self {
        RunReport {
            meta,
            state: run.state.to_string(),
            staging_dir: run.staging_dir.as_ref().map(|p| p.display().to_string()),
            tables: run.tables.as_slice().to_vec(),
            phases: run.phases.iter().map(PhaseReport::from).collect(),
            error: run.error.as_ref().map(|e| e.to_string()),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.phases.iter().map(|p| p.failed.len()).sum()
    }

    pub fn rows(&self) -> Vec<TableRow> {
        let mut rows = Vec::new();
        for p in &self.phases {
            for t in &p.succeeded {
                rows.push(TableRow { phase: p.phase.clone(), table: t.clone(), status: "ok", error: String::new() });
            }
            for f in &p.failed {
                rows.push(TableRow {
                    phase: p.phase.clone(),
                    table: f.table.clone(),
                    status: "failed",
                    error: f.error.clone(),
                });
            }
        }
        rows
    }
}
