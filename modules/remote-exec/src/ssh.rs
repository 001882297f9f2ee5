//! Remote execution through the system OpenSSH client.

use crate::{capture, Executor, LocalExecutor, Transport};
use async_trait::async_trait;
use dbsync_core::{Endpoint, ExecError, SshProfile};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Expand a leading `~` to `$HOME`. Paths without one are returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    let mut parts = path.components();
    match parts.next() {
        Some(Component::Normal(first)) if first == "~" => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(parts.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

/// One `ssh` process per command, key-based and non-interactive.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    profile: SshProfile,
    connect_timeout: Duration,
}

impl SshExecutor {
    pub fn new(profile: SshProfile, connect_timeout: Duration) -> Self {
        SshExecutor { profile, connect_timeout }
    }

    fn args(&self, remote: &str) -> Vec<String> {
        vec![
            "-i".into(),
            self.profile.key.to_string_lossy().into_owned(),
            "-p".into(),
            self.profile.port.to_string(),
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            self.profile.destination(),
            remote.to_string(),
        ]
    }
}

#[async_trait]
impl Executor for SshExecutor {
    async fn output(&self, command: &str) -> Result<Vec<u8>, ExecError> {
        let mut cmd = Command::new("ssh");
        cmd.args(self.args(command));
        capture(cmd, "ssh").await
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.profile.destination(), self.profile.port)
    }
}

/// Connects endpoints over `ssh`; runs bulk loads locally.
#[derive(Debug, Clone)]
pub struct SshTransport {
    connect_timeout: Duration,
}

impl Default for SshTransport {
    fn default() -> Self {
        SshTransport { connect_timeout: Duration::from_secs(10) }
    }
}

impl SshTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        SshTransport { connect_timeout }
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Executor>, ExecError> {
        let mut profile = endpoint.ssh.clone();
        profile.key = expand_home(&profile.key);
        tokio::fs::metadata(&profile.key)
            .await
            .map_err(|source| ExecError::Key { path: profile.key.clone(), source })?;

        let executor = SshExecutor::new(profile, self.connect_timeout);
        debug!(host = %executor.describe(), "probing ssh connection");
        executor.run("true").await?;
        info!(profile = %endpoint.name, host = %executor.describe(), "connected");
        Ok(Arc::new(executor))
    }

    fn local(&self) -> Arc<dyn Executor> {
        Arc::new(LocalExecutor)
    }
}
