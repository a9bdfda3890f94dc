//! Remote shell sessions over SSH
//!
//! Shells out to the system `ssh` client. Authentication is expected to be
//! handled by the user's agent or keys; prompts are disabled.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::SyncError;
use crate::utils::shell_quote;

/// ssh exits with 255 when the connection itself failed
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Output of a single remote command
#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

/// Executes one command on a remote host
#[async_trait]
pub trait RemoteShell: Send + Sync {
    async fn exec(&self, host: &str, port: u16, command: &str) -> Result<ShellOutput, SyncError>;
}

/// Connection policy for SSH sessions
#[derive(Debug, Clone)]
pub struct SshOptions {
    pub user: String,

    /// Bound on connection establishment
    pub connect_timeout: Duration,

    /// Interval between keepalive probes on an idle connection
    pub keepalive_interval: Duration,

    /// Unanswered probes before the connection is considered dead
    pub keepalive_count_max: u32,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            connect_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(10),
            keepalive_count_max: 3,
        }
    }
}

/// [`RemoteShell`] backed by the system `ssh` binary
#[derive(Debug, Clone, Default)]
pub struct SshShell {
    options: SshOptions,
}

impl SshShell {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    fn args(&self, host: &str, port: u16, command: &str) -> Vec<String> {
        vec![
            "-p".to_string(),
            port.to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.options.connect_timeout.as_secs()),
            "-o".to_string(),
            format!("ServerAliveInterval={}", self.options.keepalive_interval.as_secs()),
            "-o".to_string(),
            format!("ServerAliveCountMax={}", self.options.keepalive_count_max),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            format!("{}@{}", self.options.user, host),
            command.to_string(),
        ]
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn exec(&self, host: &str, port: u16, command: &str) -> Result<ShellOutput, SyncError> {
        debug!("ssh {}@{}:{} `{}`", self.options.user, host, port, command);

        let output = Command::new("ssh")
            .args(self.args(host, port, command))
            .output()
            .await
            .map_err(|e| SyncError::RemoteShell(format!("failed to spawn ssh: {}", e)))?;

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code == SSH_CONNECTION_FAILURE {
            return Err(SyncError::RemoteShell(format!(
                "error during SSH connection to {}:{}: {}",
                host,
                port,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(ShellOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code,
        })
    }
}

/// Read a file on a remote host through `shell`
pub async fn read_file(
    shell: &dyn RemoteShell,
    host: &str,
    port: u16,
    path: &Path,
) -> Result<String, SyncError> {
    let command = format!("cat {}", shell_quote(&path.to_string_lossy()));
    let output = shell.exec(host, port, &command).await?;
    if output.exit_code != 0 {
        return Err(SyncError::RemoteRead(output.exit_code));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
