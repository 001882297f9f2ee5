use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pipeline::{Orchestrator, SyncRun};
use remote_exec::SshTransport;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use sync_report::{RunMeta, RunReport};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod config;

use config::{Config, Overrides, DEFAULT_CONFIG};

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Jsonl,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "dbsync", version, about = "Copy every table of one database into another over SSH")]
struct Cli {
    /// Config file (YAML) holding the database and ssh profiles
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
    /// Log level: debug, info, warn or error (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "info")]
    verbosity: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Replace the target database's tables with the source's rows
    Sync(SyncArgs),
}

#[derive(Debug, Args)]
struct SyncArgs {
    /// Source profile name
    #[arg(long)]
    from: String,
    /// Target profile name
    #[arg(long)]
    to: String,
    /// Concurrent dumps against the source
    #[arg(long)]
    fetch_concurrency: Option<usize>,
    /// Concurrent deletes against the target
    #[arg(long)]
    delete_concurrency: Option<usize>,
    /// Concurrent bulk loads into the target
    #[arg(long)]
    load_concurrency: Option<usize>,
    /// Per-table time limit in seconds
    #[arg(long)]
    task_timeout_secs: Option<u64>,
    /// Stop a phase at its first failed table and fail the run
    #[arg(long, default_value_t = false)]
    abort_on_error: bool,
    /// Parent directory for the per-run staging directory
    #[arg(long, value_name = "DIR")]
    staging_dir: Option<PathBuf>,
    /// Report format: text, json, or jsonl
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write the report to a file (overwrites) instead of stdout
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,
    /// Write CSV (one row per phase and table) when --out is provided
    #[arg(long, default_value_t = false, requires = "out")]
    csv: bool,
}

impl SyncArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            fetch_concurrency: self.fetch_concurrency,
            delete_concurrency: self.delete_concurrency,
            load_concurrency: self.load_concurrency,
            task_timeout_secs: self.task_timeout_secs,
            abort_on_error: self.abort_on_error,
            staging_dir: self.staging_dir.clone(),
        }
    }
}

fn setup_logging(verbosity: &str, format: LogFormat) -> Result<()> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let res = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    res.map_err(|e| anyhow!("failed to initialise logging: {e}"))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Version => {
            println!("dbsync {} (core {})", env!("CARGO_PKG_VERSION"), dbsync_core::version());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sync(args) => {
            setup_logging(&cli.verbosity, cli.log_format)?;
            sync(&cli.config, &args)
        }
    }
}

fn sync(config_path: &Path, args: &SyncArgs) -> Result<ExitCode> {
    let cfg = Config::load(config_path)?;
    let ctx = cfg.resolve(&args.from, &args.to, &args.overrides())?;
    let transport = Arc::new(SshTransport::new(cfg.connect_timeout()));

    let started = OffsetDateTime::now_utc();
    let started_at = started.format(&Rfc3339).unwrap_or_default();
    let clock = Instant::now();
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let run = rt.block_on(Orchestrator::new(ctx, transport).run(started.unix_timestamp().max(0) as u64));

    let meta = RunMeta {
        run_id: Uuid::now_v7(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        from: args.from.clone(),
        to: args.to.clone(),
        started_at,
        ended_at: now_rfc3339(),
        duration_ms: clock.elapsed().as_millis() as u64,
    };
    let report = RunReport::from_run(meta, &run);
    emit(&report, args)?;
    Ok(exit_code(&run))
}

fn emit(report: &RunReport, args: &SyncArgs) -> Result<()> {
    match &args.out {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
            let mut w = BufWriter::new(file);
            if args.csv {
                report.write_csv(&mut w)?;
            } else {
                write_report(report, args.format, &mut w)?;
            }
            w.flush()?;
            info!(path = %path.display(), "report written");
        }
        None => {
            let stdout = std::io::stdout();
            write_report(report, args.format, stdout.lock())?;
        }
    }
    Ok(())
}

fn write_report<W: Write>(report: &RunReport, format: OutputFormat, mut w: W) -> Result<()> {
    match format {
        OutputFormat::Text => write!(w, "{}", report.summary_text())?,
        OutputFormat::Json => report.write_json(w)?,
        OutputFormat::Jsonl => report.write_jsonl(w)?,
    }
    Ok(())
}

fn exit_code(run: &SyncRun) -> ExitCode {
    if run.is_done() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
