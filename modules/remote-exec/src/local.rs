use crate::{capture, Executor};
use async_trait::async_trait;
use dbsync_core::ExecError;
use tokio::process::Command;

/// Runs commands through `sh -c` on the machine running the sync.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor;

#[async_trait]
impl Executor for LocalExecutor {
    async fn output(&self, command: &str) -> Result<Vec<u8>, ExecError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        capture(cmd, "sh").await
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}
