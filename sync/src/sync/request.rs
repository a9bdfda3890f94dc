//! Sync request construction

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::errors::SyncError;

pub const DEFAULT_SSH_PORT: u16 = 22;

/// Behaviour switches for one sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncFlags {
    pub skip_gitignore: bool,
    pub skip_restart: bool,
    pub show_progress: bool,
    pub verbose: bool,
}

/// A fully resolved sync invocation
///
/// Only obtainable through [`SyncRequestBuilder`], which guarantees a
/// non-empty device id and destination.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    device_id: String,
    source_dir: PathBuf,
    destination: String,
    before_hook: Option<String>,
    after_hook: Option<String>,
    ignore: BTreeSet<String>,
    port: u16,
    flags: SyncFlags,
}

impl SyncRequest {
    pub fn builder(device_id: impl Into<String>) -> SyncRequestBuilder {
        SyncRequestBuilder::new(device_id)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn before_hook(&self) -> Option<&str> {
        self.before_hook.as_deref()
    }

    pub fn after_hook(&self) -> Option<&str> {
        self.after_hook.as_deref()
    }

    pub fn ignore(&self) -> &BTreeSet<String> {
        &self.ignore
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn flags(&self) -> SyncFlags {
        self.flags
    }
}

/// Builder for [`SyncRequest`]
#[derive(Debug, Clone)]
pub struct SyncRequestBuilder {
    device_id: String,
    source_dir: PathBuf,
    destination: Option<String>,
    before_hook: Option<String>,
    after_hook: Option<String>,
    ignore: BTreeSet<String>,
    port: u16,
    flags: SyncFlags,
}

impl SyncRequestBuilder {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            source_dir: PathBuf::from("."),
            destination: None,
            before_hook: None,
            after_hook: None,
            ignore: BTreeSet::new(),
            port: DEFAULT_SSH_PORT,
            flags: SyncFlags::default(),
        }
    }

    pub fn source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = dir.into();
        self
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Empty hook commands are treated as absent
    pub fn before_hook(mut self, command: impl Into<String>) -> Self {
        self.before_hook = Some(command.into()).filter(|c: &String| !c.trim().is_empty());
        self
    }

    pub fn after_hook(mut self, command: impl Into<String>) -> Self {
        self.after_hook = Some(command.into()).filter(|c: &String| !c.trim().is_empty());
        self
    }

    pub fn ignore<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore
            .extend(patterns.into_iter().map(Into::into).filter(|p: &String| !p.is_empty()));
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn flags(mut self, flags: SyncFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn build(self) -> Result<SyncRequest, SyncError> {
        if self.device_id.trim().is_empty() {
            return Err(SyncError::MissingOption("uuid"));
        }
        let destination = self
            .destination
            .filter(|d| !d.trim().is_empty())
            .ok_or(SyncError::MissingOption("destination"))?;
        if self.port == 0 {
            return Err(SyncError::ConfigError("port must be a positive integer".to_string()));
        }

        Ok(SyncRequest {
            device_id: self.device_id,
            source_dir: self.source_dir,
            destination,
            before_hook: self.before_hook,
            after_hook: self.after_hook,
            ignore: self.ignore,
            port: self.port,
            flags: self.flags,
        })
    }
}
