//! Locating a container's root filesystem on the engine host
//!
//! Engines from 1.10.0 onwards store each container's writable layer under a
//! mount id that differs from the container id. The mount id lives in a
//! driver-specific metadata file on the engine host, which may only be
//! reachable over SSH.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use semver::Version;

use crate::errors::SyncError;
use crate::filesys::file::File;
use crate::remote::ssh::{read_file, RemoteShell};
use crate::utils::extract_version;

/// First engine version that stores layers under mount ids
pub const MOUNT_ID_MIN_ENGINE: Version = Version::new(1, 10, 0);

/// Storage drivers whose layout is understood
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageDriver {
    Btrfs,
    Overlay,
    Vfs,
    Aufs,
}

impl FromStr for StorageDriver {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "btrfs" => Ok(StorageDriver::Btrfs),
            "overlay" => Ok(StorageDriver::Overlay),
            "vfs" => Ok(StorageDriver::Vfs),
            "aufs" => Ok(StorageDriver::Aufs),
            other => Err(SyncError::UnsupportedDriver(other.to_string())),
        }
    }
}

impl StorageDriver {
    /// Layer directory for `layer_id` below the engine root
    fn layer_path(&self, root_dir: &Path, layer_id: &str) -> Option<PathBuf> {
        match self {
            StorageDriver::Btrfs => Some(root_dir.join("btrfs/subvolumes").join(layer_id)),
            StorageDriver::Vfs => Some(root_dir.join("vfs/dir").join(layer_id)),
            StorageDriver::Aufs => Some(root_dir.join("aufs/mnt").join(layer_id)),
            StorageDriver::Overlay => None,
        }
    }
}

/// What the engine reports about itself and the container
#[derive(Debug, Clone)]
pub struct EngineFacts {
    /// Engine root directory, e.g. `/var/lib/docker`
    pub root_dir: PathBuf,
    pub driver: String,
    pub engine_version: String,
    pub container_id: String,

    /// `GraphDriver.Data.RootDir` from the container inspect
    pub graph_root_dir: Option<String>,
}

impl EngineFacts {
    /// Path of the metadata file holding the container's mount id
    pub fn mount_id_file(&self) -> PathBuf {
        self.root_dir
            .join("image")
            .join(&self.driver)
            .join("layerdb/mounts")
            .join(&self.container_id)
            .join("mount-id")
    }
}

/// Reads the mount id metadata file
#[async_trait]
pub trait MountIdReader: Send + Sync {
    async fn read(&self, path: &Path) -> Result<String, SyncError>;
}

/// Reads from the local filesystem
pub struct LocalReader;

#[async_trait]
impl MountIdReader for LocalReader {
    async fn read(&self, path: &Path) -> Result<String, SyncError> {
        File::new(path).read_string().await
    }
}

/// Reads through a remote shell session on the engine host
pub struct RemoteReader<'a> {
    pub shell: &'a dyn RemoteShell,
    pub host: &'a str,
    pub port: u16,
}

#[async_trait]
impl MountIdReader for RemoteReader<'_> {
    async fn read(&self, path: &Path) -> Result<String, SyncError> {
        read_file(self.shell, self.host, self.port, path).await
    }
}

/// Resolve the root filesystem path of the container described by `facts`
pub async fn resolve(facts: &EngineFacts, reader: &dyn MountIdReader) -> Result<PathBuf, SyncError> {
    let driver: StorageDriver = facts.driver.parse()?;

    if driver == StorageDriver::Overlay {
        return facts
            .graph_root_dir
            .as_ref()
            .map(PathBuf::from)
            .ok_or_else(|| SyncError::EngineInfo("overlay container without GraphDriver.Data.RootDir".to_string()));
    }

    let engine_version = extract_version(&facts.engine_version)
        .ok_or_else(|| SyncError::UnparsableVersion(facts.engine_version.clone()))?;

    let layer_id = if engine_version < MOUNT_ID_MIN_ENGINE {
        facts.container_id.clone()
    } else {
        reader.read(&facts.mount_id_file()).await?.trim().to_string()
    };

    driver
        .layer_path(&facts.root_dir, &layer_id)
        .ok_or_else(|| SyncError::UnsupportedDriver(facts.driver.clone()))
}
