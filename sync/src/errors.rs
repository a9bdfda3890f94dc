//! Error types for resin sync

use thiserror::Error;

use crate::docker::progress::ProgressError;

/// Main error type for resin sync
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("'{0}' is a required sync option")]
    MissingOption(&'static str),

    #[error("Device is offline: {0}")]
    DeviceOffline(String),

    #[error("Resin sync is permitted to the device owner only. The device owner is the user who provisioned it.")]
    NotDeviceOwner,

    #[error("Could not parse semantic version from HostOS release info: {0}")]
    UnparsableVersion(String),

    #[error("Incompatible HostOS version: {release} - must be >= {minimum}")]
    IncompatibleHostOs { release: String, minimum: String },

    #[error("Fetched device info is missing required fields '{}'", .0.join("', '"))]
    MissingDeviceFields(Vec<&'static str>),

    #[error("No application container found")]
    NoApplicationContainer,

    #[error("Invalid environment variable: {0}")]
    InvalidEnvVar(String),

    #[error("Unsupported driver: {0}/")]
    UnsupportedDriver(String),

    #[error("Error while {op} {target}: {source}")]
    Engine {
        op: &'static str,
        target: String,
        #[source]
        source: bollard::errors::Error,
    },

    #[error("Engine reported incomplete info: {0}")]
    EngineInfo(String),

    #[error(transparent)]
    Progress(#[from] ProgressError),

    #[error("Command '{command}' failed with exit code {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("Remote shell error: {0}")]
    RemoteShell(String),

    #[error("Could not read file from Docker Host. Code: {0}")]
    RemoteRead(i32),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::Internal(err.to_string())
    }
}
