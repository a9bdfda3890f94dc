//! Device sync workflow
//!
//! Drives one sync through [`SyncFsm`]: validate the device, run the
//! before-command, transfer the source tree into the application container,
//! restart the application and run the after-command. A failure once files
//! may have been touched triggers a best-effort application start so the
//! device is never left with a stopped container.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::device::compat::{ensure_host_os_compatibility, MIN_HOSTOS_RSYNC};
use crate::device::directory::{DeviceDirectory, DeviceInfo};
use crate::errors::SyncError;
use crate::remote::rsync::{TransferExecutor, TransferSpec};
use crate::remote::shell::CommandRunner;
use crate::sync::fsm::{SyncEvent, SyncFsm, SyncState};
use crate::sync::reporter::Reporter;
use crate::sync::request::SyncRequest;
use crate::utils::short_id;

pub const SUCCESS_MESSAGE: &str = "resin sync completed successfully!";
pub const FAILURE_MESSAGE: &str = "resin sync failed.";

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// SSH gateway relaying into devices, `ssh.<proxy>`
    pub gateway_host: String,

    /// Lowest host OS release able to receive a sync
    pub min_host_os: String,
}

impl OrchestratorOptions {
    pub fn for_proxy(proxy: &str) -> Self {
        Self {
            gateway_host: format!("ssh.{}", proxy),
            min_host_os: MIN_HOSTOS_RSYNC.to_string(),
        }
    }
}

/// Runs device syncs
///
/// Holds no per-sync state; concurrent syncs to different devices may share
/// one orchestrator.
pub struct Orchestrator {
    directory: Arc<dyn DeviceDirectory>,
    transfer: Arc<dyn TransferExecutor>,
    runner: Arc<dyn CommandRunner>,
    reporter: Arc<dyn Reporter>,
    options: OrchestratorOptions,
}

/// Facts gathered while validating, carried through the later stages
struct Target {
    device: DeviceInfo,
    username: String,
}

impl Orchestrator {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        transfer: Arc<dyn TransferExecutor>,
        runner: Arc<dyn CommandRunner>,
        reporter: Arc<dyn Reporter>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            directory,
            transfer,
            runner,
            reporter,
            options,
        }
    }

    /// Run one sync to completion
    ///
    /// The returned error is always the one that ended the sync, even when
    /// the compensating restart fails as well.
    pub async fn sync(&self, request: &SyncRequest) -> Result<(), SyncError> {
        let mut fsm = SyncFsm::new();
        let mut full_id: Option<String> = None;

        match self.drive(request, &mut fsm, &mut full_id).await {
            Ok(()) => {
                info!("Sync to {} finished", request.device_id());
                self.reporter.success(SUCCESS_MESSAGE);
                Ok(())
            }
            Err(err) => {
                if let Err(e) = fsm.process(SyncEvent::Fail(err.to_string())) {
                    warn!("{}", e);
                }
                error!("Sync to {} failed in {:?}: {}", request.device_id(), fsm.failed_in(), err);

                if fsm.needs_compensation() {
                    if let Some(full_id) = &full_id {
                        self.compensate(full_id).await;
                    }
                }

                self.reporter.failure(FAILURE_MESSAGE, &err.to_string());
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        request: &SyncRequest,
        fsm: &mut SyncFsm,
        full_id: &mut Option<String>,
    ) -> Result<(), SyncError> {
        advance(fsm, SyncEvent::Begin)?;
        let target = self.validate(request.device_id()).await?;
        *full_id = Some(target.device.full_id.clone());
        advance(fsm, SyncEvent::Validated)?;

        if let Some(command) = request.before_hook() {
            info!("Running before-command `{}`", command);
            self.runner.run(command, request.source_dir()).await?;
        }
        advance(fsm, SyncEvent::PreHookDone)?;

        self.transfer(request, &target).await?;
        advance(fsm, SyncEvent::Transferred)?;

        if request.flags().skip_restart {
            debug!("Restart skipped for {}", target.device.full_id);
            advance(fsm, SyncEvent::RestartSkipped)?;
        } else {
            self.restart(&target.device.full_id).await?;
            advance(fsm, SyncEvent::Restarted)?;
        }

        if let Some(command) = request.after_hook() {
            info!("Running after-command `{}`", command);
            self.runner.run(command, request.source_dir()).await?;
        }
        advance(fsm, SyncEvent::PostHookDone)?;

        debug_assert_eq!(fsm.state(), SyncState::Done);
        Ok(())
    }

    async fn validate(&self, device_id: &str) -> Result<Target, SyncError> {
        if !self.directory.is_online(device_id).await? {
            return Err(SyncError::DeviceOffline(device_id.to_string()));
        }

        let device = self.directory.get_device(device_id).await?;
        if !device.is_online {
            return Err(SyncError::DeviceOffline(device_id.to_string()));
        }

        let user = self.directory.current_user().await?;
        if device.owner_user_id != user.id {
            return Err(SyncError::NotDeviceOwner);
        }

        ensure_host_os_compatibility(&device.host_os_version, &self.options.min_host_os)?;

        info!("Validated device {}", short_id(&device.full_id));
        Ok(Target {
            device,
            username: user.username,
        })
    }

    async fn transfer(&self, request: &SyncRequest, target: &Target) -> Result<(), SyncError> {
        let full_id = &target.device.full_id;
        let container_id = self
            .directory
            .application_container_id(full_id)
            .await?
            .ok_or(SyncError::NoApplicationContainer)?;

        let flags = request.flags();
        let spec = TransferSpec {
            source: request.source_dir().to_path_buf(),
            destination: request.destination().to_string(),
            ignore: request.ignore().iter().cloned().collect(),
            skip_gitignore: flags.skip_gitignore,
            verbose: flags.verbose,
            progress: flags.show_progress,
            port: request.port(),
            username: target.username.clone(),
            host: self.options.gateway_host.clone(),
            full_id: full_id.clone(),
            container_id,
        };
        let command = self.transfer.build_command(&spec)?;
        debug!("Transfer command: {}", command);

        let short = short_id(full_id);
        self.reporter
            .start(&format!("Syncing to {} on {}...", request.destination(), short));
        self.runner.run(&command, request.source_dir()).await?;
        self.reporter
            .stop(&format!("Synced {} on {}.", request.destination(), short));
        Ok(())
    }

    async fn restart(&self, full_id: &str) -> Result<(), SyncError> {
        let short = short_id(full_id);
        self.reporter.info(&format!("Stopping application container on device {}", short));
        self.directory.stop_application(full_id).await?;
        self.reporter.info(&format!("Starting application container on device {}", short));
        self.directory.start_application(full_id).await?;
        Ok(())
    }

    /// Best-effort start after a failure; never fails
    async fn compensate(&self, full_id: &str) {
        info!("Restarting application on {} after failed sync", short_id(full_id));
        if let Err(e) = self.directory.start_application(full_id).await {
            warn!("Could not restart application on {}: {}", short_id(full_id), e);
            self.reporter
                .info(&format!("Could not restart application container: {}", e));
        }
    }
}

fn advance(fsm: &mut SyncFsm, event: SyncEvent) -> Result<(), SyncError> {
    fsm.process(event).map_err(SyncError::InvalidTransition)
}
