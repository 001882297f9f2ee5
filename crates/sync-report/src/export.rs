use crate::RunReport;
use anyhow::Result;
use std::io::Write;

impl RunReport {
    /// Human-readable summary naming every failed table.
    pub fn summary_text(&self) -> String {
        let mut out = format!(
            "sync {} -> {}: {} ({} tables, {} ms)\n",
            self.meta.from,
            self.meta.to,
            self.state,
            self.tables.len(),
            self.meta.duration_ms
        );
        for p in &self.phases {
            out.push_str(&format!(
                "  {:<6} ok={} failed={} ({} ms)\n",
                p.phase,
                p.succeeded.len(),
                p.failed.len(),
                p.elapsed_ms
            ));
            for f in &p.failed {
                out.push_str(&format!("    {} failed: {}\n", f.table, f.error));
            }
        }
        if let Some(e) = &self.error {
            out.push_str(&format!("  error: {}\n", e));
        }
        out
    }

    pub fn write_json<W: Write>(&self, mut w: W) -> Result<()> {
        writeln!(w, "{}", serde_json::to_string(self)?)?;
        Ok(())
    }

    /// One JSON object per (phase, table).
    pub fn write_jsonl<W: Write>(&self, mut w: W) -> Result<()> {
        for row in self.rows() {
            let obj = serde_json::json!({
                "run_id": self.meta.run_id,
                "phase": row.phase,
                "table": row.table,
                "status": row.status,
                "error": if row.error.is_empty() { None } else { Some(row.error) },
            });
            writeln!(w, "{}", serde_json::to_string(&obj)?)?;
        }
        Ok(())
    }

    pub fn write_csv<W: Write>(&self, w: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(w);
        wtr.write_record(["run_id", "phase", "table", "status", "error"])?;
        let run_id = self.meta.run_id.to_string();
        for row in self.rows() {
            wtr.write_record([
                run_id.as_str(),
                row.phase.as_str(),
                row.table.as_str(),
                row.status,
                row.error.as_str(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{FailedTable, PhaseReport, RunMeta, RunReport};
    use uuid::Uuid;

    fn report() -> RunReport {
        RunReport {
            meta: RunMeta {
                run_id: Uuid::nil(),
                tool_version: "0.1.0".into(),
                from: "prod".into(),
                to: "stage".into(),
                started_at: "2024-05-01T10:00:00Z".into(),
                ended_at: "2024-05-01T10:00:02Z".into(),
                duration_ms: 2000,
            },
            state: "done".into(),
            staging_dir: None,
            tables: vec!["customers".into(), "orders".into()],
            phases: vec![
                PhaseReport {
                    phase: "fetch".into(),
                    succeeded: vec!["customers".into()],
                    failed: vec![FailedTable { table: "orders".into(), error: "command exited with 1".into() }],
                    elapsed_ms: 1200,
                },
                PhaseReport {
                    phase: "delete".into(),
                    succeeded: vec!["customers".into(), "orders".into()],
                    failed: vec![],
                    elapsed_ms: 300,
                },
            ],
            error: None,
        }
    }

    #[test]
    fn summary_lists_failed_tables() {
        let r = report();
        let text = r.summary_text();
        assert!(text.starts_with("sync prod -> stage: done (2 tables, 2000 ms)"));
        assert!(text.contains("orders failed: command exited with 1"));
        assert_eq!(r.failed_count(), 1);
    }

    #[test]
    fn csv_has_one_row_per_phase_and_table() {
        let mut buf = Vec::new();
        report().write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "run_id,phase,table,status,error");
        assert_eq!(lines.len(), 5);
        assert!(lines.contains(&"00000000-0000-0000-0000-000000000000,fetch,orders,failed,command exited with 1"));
    }

    #[test]
    fn json_flattens_run_metadata() {
        let mut buf = Vec::new();
        report().write_json(&mut buf).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["from"], "prod");
        assert_eq!(v["state"], "done");
        assert_eq!(v["phases"][0]["failed"][0]["table"], "orders");
    }

    #[test]
    fn jsonl_omits_empty_errors() {
        let mut buf = Vec::new();
        report().write_jsonl(&mut buf).unwrap();
        let first: serde_json::Value = serde_json::from_str(String::from_utf8(buf).unwrap().lines().next().unwrap()).unwrap();
        assert_eq!(first["status"], "ok");
        assert!(first["error"].is_null());
    }
}
