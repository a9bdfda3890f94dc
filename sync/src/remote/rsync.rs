//! File transfer command construction

use std::path::PathBuf;

use crate::errors::SyncError;
use crate::utils::shell_quote;

/// Everything needed to transfer a source tree into a device container
#[derive(Debug, Clone)]
pub struct TransferSpec {
    pub source: PathBuf,
    pub destination: String,
    pub ignore: Vec<String>,
    pub skip_gitignore: bool,
    pub verbose: bool,
    pub progress: bool,

    /// SSH port of the gateway
    pub port: u16,

    pub username: String,

    /// Gateway host relaying into the device
    pub host: String,

    pub full_id: String,
    pub container_id: String,
}

/// Builds the shell command that performs a transfer
pub trait TransferExecutor: Send + Sync {
    fn build_command(&self, spec: &TransferSpec) -> Result<String, SyncError>;
}

/// Builds `rsync` invocations tunnelled through the device SSH gateway
#[derive(Debug, Clone, Default)]
pub struct RsyncCommand;

impl RsyncCommand {
    fn remote_shell(spec: &TransferSpec) -> String {
        // The gateway routes `rsync <device> <container>` into the container
        format!(
            "ssh -p {} -o LogLevel=ERROR -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null -o ControlMaster=no {}@{} rsync {} {}",
            spec.port, spec.username, spec.host, spec.full_id, spec.container_id
        )
    }
}

impl TransferExecutor for RsyncCommand {
    fn build_command(&self, spec: &TransferSpec) -> Result<String, SyncError> {
        if spec.destination.is_empty() {
            return Err(SyncError::MissingOption("destination"));
        }

        let mut args: Vec<String> = vec!["rsync".to_string(), "-az".to_string(), "--delete".to_string()];
        if spec.verbose {
            args.push("-v".to_string());
        }
        if spec.progress {
            args.push("--progress".to_string());
        }

        args.push(format!("--rsh={}", shell_quote(&Self::remote_shell(spec))));

        if !spec.skip_gitignore {
            args.push(shell_quote("--filter=:- .gitignore"));
        }
        for pattern in &spec.ignore {
            args.push(format!("--exclude={}", shell_quote(pattern)));
        }

        args.push("./".to_string());
        args.push(shell_quote(&format!(
            "{}@{}:{}",
            spec.username, spec.host, spec.destination
        )));

        Ok(args.join(" "))
    }
}
