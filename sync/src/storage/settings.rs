//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::errors::SyncError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::remote::ssh::SshOptions;
use crate::storage::layout::StorageLayout;

/// Environment variable consulted when no token is configured
pub const TOKEN_ENV_VAR: &str = "RESIN_TOKEN";

/// resin-sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Also write logs under the local logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// Device API configuration
    #[serde(default)]
    pub api: ApiSettings,

    /// Domain of the device proxy; the SSH gateway is `ssh.<proxy>`
    #[serde(default = "default_proxy")]
    pub proxy: String,

    /// Port of the remote container engine
    #[serde(default = "default_engine_port")]
    pub engine_port: u16,

    /// Remote shell connection policy
    #[serde(default)]
    pub ssh: SshSettings,
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_proxy() -> String {
    "resindevice.io".to_string()
}

fn default_engine_port() -> u16 {
    2375
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_to_file: false,
            api: ApiSettings::default(),
            proxy: default_proxy(),
            engine_port: default_engine_port(),
            ssh: SshSettings::default(),
        }
    }
}

impl Settings {
    /// Read settings from `file`; a missing file yields defaults
    pub async fn load(file: &File) -> Result<Self, SyncError> {
        if !file.exists().await {
            debug!("No settings at {}, using defaults", file.path().display());
            return Ok(Self::default());
        }

        let settings: Settings = file.read_json().await.map_err(|e| {
            SyncError::ConfigError(format!("Malformed settings file {}: {}", file.path().display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        Url::parse(&self.api.base_url)
            .map_err(|e| SyncError::ConfigError(format!("Invalid api.base_url {}: {}", self.api.base_url, e)))?;
        if self.proxy.trim().is_empty() {
            return Err(SyncError::ConfigError("proxy must not be empty".to_string()));
        }
        Ok(())
    }

    /// Write these settings to `file`
    pub async fn save(&self, file: &File) -> Result<(), SyncError> {
        self.validate()?;
        file.write_json(self).await
    }

    /// Log directory used when none is given on the command line
    pub fn log_dir(&self, layout: &StorageLayout) -> Option<PathBuf> {
        self.log_to_file.then(|| layout.logs_dir())
    }

    /// Configured token, falling back to the environment
    pub fn api_token(&self) -> Option<String> {
        self.api
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty()))
    }
}

/// Device API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL for the device API
    #[serde(default = "default_api_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_api_url() -> String {
    "https://api.resin.io/v1".to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            token: None,
        }
    }
}

/// Remote shell settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    #[serde(default = "default_ssh_user")]
    pub user: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,

    #[serde(default = "default_keepalive_count")]
    pub keepalive_count_max: u32,
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_keepalive_interval() -> u64 {
    10
}

fn default_keepalive_count() -> u32 {
    3
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: default_ssh_user(),
            connect_timeout_secs: default_connect_timeout(),
            keepalive_interval_secs: default_keepalive_interval(),
            keepalive_count_max: default_keepalive_count(),
        }
    }
}

impl From<&SshSettings> for SshOptions {
    fn from(settings: &SshSettings) -> Self {
        SshOptions {
            user: settings.user.clone(),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            keepalive_interval: Duration::from_secs(settings.keepalive_interval_secs),
            keepalive_count_max: settings.keepalive_count_max,
        }
    }
}
