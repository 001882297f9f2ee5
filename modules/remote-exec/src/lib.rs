//! Command execution against source, target and the local host.

use async_trait::async_trait;
use dbsync_core::{Endpoint, ExecError};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

mod command;
mod local;
mod ssh;

pub use command::{redact, CommandSet};
pub use local::LocalExecutor;
pub use ssh::{expand_home, SshExecutor, SshTransport};

/// Runs shell commands on one host.
///
/// Calls are independent of each other: an implementation may open a fresh
/// session per call, so concurrent callers never share session state.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `command` and return its captured standard output.
    async fn output(&self, command: &str) -> Result<Vec<u8>, ExecError>;

    /// Run `command` when only success or failure matters.
    async fn run(&self, command: &str) -> Result<(), ExecError> {
        self.output(command).await.map(|_| ())
    }

    /// Human-readable host description for logs.
    fn describe(&self) -> String;
}

/// Produces executors for endpoints and for the local host.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish an execution capability for `endpoint`. Errors here are fatal to a run.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Executor>, ExecError>;

    fn local(&self) -> Arc<dyn Executor>;
}

/// Spawn `cmd`, wait for it, and return stdout; non-zero exit becomes [`ExecError::Failed`].
/// The child is killed if the returned future is dropped (e.g. on task timeout).
pub(crate) async fn capture(mut cmd: Command, program: &str) -> Result<Vec<u8>, ExecError> {
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    let out = cmd
        .output()
        .await
        .map_err(|source| ExecError::Spawn { program: program.to_string(), source })?;
    if !out.status.success() {
        return Err(ExecError::Failed {
            status: out.status.to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }
    Ok(out.stdout)
}
