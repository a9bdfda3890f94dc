//! Remote container engine client
//!
//! One client is bound to one engine endpoint for its lifetime. Operations
//! are idempotent with respect to the desired end state; see
//! [`crate::docker::outcome`] for which engine answers count as success.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bollard::container::{
    AttachContainerOptions, AttachContainerResults, CreateContainerOptions, InspectContainerOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::{BuildImageOptions, RemoveImageOptions};
use bollard::models::ImageInspect;
use bollard::Docker;
use futures::StreamExt;
use tracing::{debug, info};

use crate::docker::env::{EnvValidator, KeyValueEnvValidator};
use crate::docker::outcome::{engine_error, settle, EngineOp};
use crate::docker::policy::{default_command, ContainerHandle};
use crate::docker::progress::{render, ProgressEvent};
use crate::docker::rootfs::{self, EngineFacts, LocalReader, RemoteReader};
use crate::errors::SyncError;
use crate::remote::ssh::{RemoteShell, SshShell};

/// Seconds the engine waits for a container to exit before killing it
pub const STOP_GRACE_SECS: i64 = 10;

/// Seconds before an engine request is abandoned
pub const ENGINE_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Engine host reachable over SSH, used for reading engine metadata files
#[derive(Debug, Clone)]
pub struct RemoteHost {
    pub host: String,
    pub port: u16,
}

/// Client for one remote engine endpoint
pub struct EngineClient {
    docker: Docker,
    endpoint: String,
    env_validator: Arc<dyn EnvValidator>,
    shell: Arc<dyn RemoteShell>,
}

impl EngineClient {
    /// Connect to the engine listening on `host:port`
    pub fn connect(host: &str, port: u16) -> Result<Self, SyncError> {
        let endpoint = format!("tcp://{}:{}", host, port);
        let docker = Docker::connect_with_http(&endpoint, ENGINE_REQUEST_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            .map_err(|e| SyncError::ConfigError(format!("Invalid engine endpoint {}: {}", endpoint, e)))?;

        Ok(Self {
            docker,
            endpoint,
            env_validator: Arc::new(KeyValueEnvValidator),
            shell: Arc::new(SshShell::default()),
        })
    }

    pub fn with_env_validator(mut self, validator: Arc<dyn EnvValidator>) -> Self {
        self.env_validator = validator;
        self
    }

    pub fn with_remote_shell(mut self, shell: Arc<dyn RemoteShell>) -> Self {
        self.shell = shell;
        self
    }

    /// Endpoint this client is bound to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether an image called `name` exists
    pub async fn image_exists(&self, name: &str) -> Result<bool, SyncError> {
        debug!("Inspecting image {} on {}", name, self.endpoint);
        let inspect = self.docker.inspect_image(name).await;
        Ok(settle(EngineOp::ImageExists, name, inspect)?.is_some())
    }

    /// Whether container `name` exists and is running
    pub async fn container_is_running(&self, name: &str) -> Result<bool, SyncError> {
        debug!("Inspecting container {} on {}", name, self.endpoint);
        let inspect = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await;

        Ok(settle(EngineOp::ContainerRunning, name, inspect)?
            .and_then(|info| info.state)
            .and_then(|state| state.running)
            .unwrap_or(false))
    }

    /// Build `context_dir` into an image tagged `name`, rendering progress to `sink`
    pub async fn build_image<W: Write>(&self, context_dir: &Path, name: &str, sink: W) -> Result<(), SyncError> {
        info!("Building image {} from {}", name, context_dir.display());
        let archive = pack_context(context_dir).await?;

        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: name.to_string(),
            rm: true,
            ..Default::default()
        };

        let events = self
            .docker
            .build_image(options, None, Some(archive.into()))
            .map(|item| match item {
                Ok(info) => Ok(ProgressEvent::from(info)),
                // The engine's own error line, lifted out of the event by bollard
                Err(bollard::errors::Error::DockerStreamError { error }) => Ok(ProgressEvent {
                    error: Some(error),
                    ..Default::default()
                }),
                Err(e) => Err(engine_error(EngineOp::BuildImage, name, e)),
            });

        render(events, sink).await?;
        Ok(())
    }

    /// Create container `name` from the image of the same name
    ///
    /// Uses the image's own command when it has one.
    pub async fn create_container(&self, name: &str, env: &[String]) -> Result<(), SyncError> {
        let env = self.env_validator.validate(env)?;
        let image = self.inspect_image(name).await?;

        let cmd = image
            .config
            .and_then(|config| config.cmd)
            .filter(|cmd| !cmd.is_empty())
            .unwrap_or_else(default_command);

        let handle = ContainerHandle::for_app(name);
        let options = CreateContainerOptions {
            name: handle.name.clone(),
            platform: None,
        };

        debug!("Creating container {} with command {:?}", name, cmd);
        self.docker
            .create_container(Some(options), handle.config(cmd, env))
            .await
            .map_err(|e| engine_error(EngineOp::CreateContainer, name, e))?;
        Ok(())
    }

    /// Start container `name`; already running is fine
    pub async fn start_container(&self, name: &str) -> Result<(), SyncError> {
        debug!("Starting container {}", name);
        let result = self
            .docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await;
        settle(EngineOp::StartContainer, name, result)?;
        Ok(())
    }

    /// Stop container `name`; missing or already stopped is fine
    pub async fn stop_container(&self, name: &str) -> Result<(), SyncError> {
        debug!("Stopping container {}", name);
        let result = self
            .docker
            .stop_container(name, Some(StopContainerOptions { t: STOP_GRACE_SECS }))
            .await;
        settle(EngineOp::StopContainer, name, result)?;
        Ok(())
    }

    /// Force-remove container `name` and its anonymous volumes
    pub async fn remove_container(&self, name: &str) -> Result<(), SyncError> {
        debug!("Removing container {}", name);
        let options = RemoveContainerOptions {
            v: true,
            force: true,
            ..Default::default()
        };
        let result = self.docker.remove_container(name, Some(options)).await;
        settle(EngineOp::RemoveContainer, name, result)?;
        Ok(())
    }

    /// Force-remove image `name`
    pub async fn remove_image(&self, name: &str) -> Result<(), SyncError> {
        debug!("Removing image {}", name);
        let options = RemoveImageOptions {
            force: true,
            ..Default::default()
        };
        let result = self.docker.remove_image(name, Some(options), None).await;
        settle(EngineOp::RemoveImage, name, result)?;
        Ok(())
    }

    pub async fn inspect_image(&self, name: &str) -> Result<ImageInspect, SyncError> {
        self.docker
            .inspect_image(name)
            .await
            .map_err(|e| engine_error(EngineOp::InspectImage, name, e))
    }

    /// Pipe the output of container `name` to `sink`
    ///
    /// A running container is attached live; a stopped one replays its
    /// buffered logs instead.
    pub async fn stream_container_logs<W: Write>(&self, name: &str, mut sink: W) -> Result<(), SyncError> {
        let info = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(|e| engine_error(EngineOp::InspectContainer, name, e))?;
        let running = info.state.and_then(|state| state.running).unwrap_or(false);

        let options = AttachContainerOptions::<String> {
            stdout: Some(true),
            stderr: Some(true),
            stream: Some(running),
            logs: Some(!running),
            ..Default::default()
        };

        let AttachContainerResults { mut output, .. } = self
            .docker
            .attach_container(name, Some(options))
            .await
            .map_err(|e| engine_error(EngineOp::AttachContainer, name, e))?;

        while let Some(chunk) = output.next().await {
            let chunk = chunk.map_err(|e| engine_error(EngineOp::AttachContainer, name, e))?;
            sink.write_all(&chunk.into_bytes())?;
            sink.flush()?;
        }
        Ok(())
    }

    /// [`Self::stream_container_logs`] for a named application
    pub async fn follow_container_logs<W: Write>(&self, app_name: &str, sink: W) -> Result<(), SyncError> {
        if app_name.is_empty() {
            return Err(SyncError::MissingOption("application name"));
        }
        self.stream_container_logs(app_name, sink).await
    }

    /// On-disk root filesystem of `container` on the engine host
    ///
    /// The mount id file is read locally unless `remote` names the engine
    /// host, in which case it is read over SSH.
    pub async fn container_root_dir(&self, container: &str, remote: Option<&RemoteHost>) -> Result<PathBuf, SyncError> {
        let (info, version, inspect) = tokio::try_join!(
            async {
                self.docker
                    .info()
                    .await
                    .map_err(|e| engine_error(EngineOp::EngineInfo, &self.endpoint, e))
            },
            async {
                self.docker
                    .version()
                    .await
                    .map_err(|e| engine_error(EngineOp::EngineVersion, &self.endpoint, e))
            },
            async {
                self.docker
                    .inspect_container(container, None::<InspectContainerOptions>)
                    .await
                    .map_err(|e| engine_error(EngineOp::InspectContainer, container, e))
            },
        )?;

        let facts = EngineFacts {
            root_dir: info
                .docker_root_dir
                .map(PathBuf::from)
                .ok_or_else(|| SyncError::EngineInfo("missing DockerRootDir".to_string()))?,
            driver: info
                .driver
                .ok_or_else(|| SyncError::EngineInfo("missing Driver".to_string()))?,
            engine_version: version
                .version
                .ok_or_else(|| SyncError::EngineInfo("missing Version".to_string()))?,
            container_id: inspect
                .id
                .ok_or_else(|| SyncError::EngineInfo(format!("missing Id for container {}", container)))?,
            graph_root_dir: inspect
                .graph_driver
                .and_then(|graph| graph.data.get("RootDir").cloned()),
        };

        match remote {
            Some(remote) => {
                let reader = RemoteReader {
                    shell: self.shell.as_ref(),
                    host: &remote.host,
                    port: remote.port,
                };
                rootfs::resolve(&facts, &reader).await
            }
            None => rootfs::resolve(&facts, &LocalReader).await,
        }
    }
}

/// Package a build context directory as an in-memory tar archive
pub async fn pack_context(dir: &Path) -> Result<Vec<u8>, SyncError> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
        let mut builder = tar::Builder::new(Vec::new());
        builder.follow_symlinks(false);
        builder.append_dir_all(".", &dir)?;
        builder.into_inner()
    })
    .await
    .map_err(|e| SyncError::Internal(format!("build context packaging panicked: {}", e)))?
    .map_err(SyncError::from)
}
