//! Local shell command runner

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::SyncError;

/// Runs shell commands in a working directory
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` in `cwd`; a non-zero exit is an error
    async fn run(&self, command: &str, cwd: &Path) -> Result<(), SyncError>;
}

/// Runs commands through `sh -c` with inherited stdio
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, cwd: &Path) -> Result<(), SyncError> {
        debug!("Running `{}` in {}", command, cwd.display());

        let status = Command::new("sh")
            .current_dir(cwd)
            .args(["-c", command])
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        if !status.success() {
            return Err(SyncError::CommandFailed {
                command: command.to_string(),
                code: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}
