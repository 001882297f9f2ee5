//! CLI integration tests for dbsync.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn cmd() -> Command {
    Command::cargo_bin("dbsync").unwrap()
}

/// Two profiles whose ssh keys do not exist, so a sync fails before any network I/O.
fn config_file(dir: &std::path::Path) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    write!(
        f,
        r#"
database:
  prod: {{ host: 10.0.0.5, name: shop, user: app, password: s3cret }}
  stage: {{ host: 10.0.1.5, name: shop, user: app }}
ssh:
  prod: {{ host: prod.invalid, user: deploy, key: {dir}/missing_prod_key }}
  stage: {{ host: stage.invalid, user: deploy, key: {dir}/missing_stage_key }}
staging_dir: {dir}
"#,
        dir = dir.display()
    )
    .unwrap();
    f
}

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("version"));
}

#[test]
fn test_sync_subcommand_help() {
    cmd()
        .args(["sync", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--from"))
        .stdout(predicate::str::contains("--to"))
        .stdout(predicate::str::contains("--abort-on-error"));
}

#[test]
fn test_version_subcommand() {
    cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("dbsync "));
}

#[test]
fn test_sync_requires_profiles() {
    cmd().arg("sync").assert().failure().stderr(predicate::str::contains("--from"));
}

#[test]
fn test_csv_requires_out() {
    cmd()
        .args(["sync", "--from", "prod", "--to", "stage", "--csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--out"));
}

#[test]
fn test_missing_config_fails() {
    cmd()
        .args(["sync", "--config", "/nonexistent/dbsync.yaml", "--from", "prod", "--to", "stage"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config"));
}

#[test]
fn test_unknown_profile_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_file(dir.path());
    cmd()
        .arg("sync")
        .arg("--config")
        .arg(cfg.path())
        .args(["--from", "prod", "--to", "qa"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no database profile named \"qa\""));
}

#[test]
fn test_same_profile_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_file(dir.path());
    cmd()
        .arg("sync")
        .arg("--config")
        .arg(cfg.path())
        .args(["--from", "prod", "--to", "prod"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("same profile"));
}

#[test]
fn test_unreachable_source_reports_failed_run() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_file(dir.path());
    cmd()
        .env_remove("RUST_LOG")
        .arg("sync")
        .arg("--config")
        .arg(cfg.path())
        .args(["--from", "prod", "--to", "stage", "--format", "json"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"state\":\"failed\""))
        .stdout(predicate::str::contains("missing_prod_key"));
}

#[test]
fn test_failed_run_writes_csv_header() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_file(dir.path());
    let out = dir.path().join("report.csv");
    cmd()
        .arg("sync")
        .arg("--config")
        .arg(cfg.path())
        .args(["--from", "prod", "--to", "stage", "--csv", "--out"])
        .arg(&out)
        .assert()
        .code(1);
    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(text.trim_end(), "run_id,phase,table,status,error");
}
