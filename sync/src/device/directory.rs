//! Device directory collaborator

use async_trait::async_trait;
use device_api::models::{DeviceRecord, WhoAmI};

use crate::errors::SyncError;

/// Fields a device record must carry before a sync may target it
pub const REQUIRED_DEVICE_FIELDS: [&str; 3] = ["uuid", "os_version", "user"];

/// Device details fetched at the start of every sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Canonical (full length) device id
    pub full_id: String,

    /// Host OS release text
    pub host_os_version: String,

    pub owner_user_id: String,

    pub is_online: bool,
}

impl DeviceInfo {
    /// Build from a raw directory record, failing on any missing required field
    pub fn from_record(record: DeviceRecord) -> Result<Self, SyncError> {
        let missing: Vec<&'static str> = REQUIRED_DEVICE_FIELDS
            .into_iter()
            .filter(|field| match *field {
                "uuid" => record.uuid.as_deref().map_or(true, str::is_empty),
                "os_version" => record.os_version.is_none(),
                "user" => record.user.is_none(),
                _ => false,
            })
            .collect();

        match record {
            DeviceRecord {
                uuid: Some(full_id),
                os_version: Some(host_os_version),
                user: Some(owner),
                is_online,
                ..
            } if missing.is_empty() => Ok(Self {
                full_id,
                host_os_version,
                owner_user_id: owner.id,
                is_online,
            }),
            _ => Err(SyncError::MissingDeviceFields(missing)),
        }
    }
}

/// Remote directory of devices and their applications
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Fetch a device by full or short id
    async fn get_device(&self, id: &str) -> Result<DeviceInfo, SyncError>;

    async fn is_online(&self, id: &str) -> Result<bool, SyncError>;

    /// Id of the application container currently running on the device
    async fn application_container_id(&self, full_id: &str) -> Result<Option<String>, SyncError>;

    async fn stop_application(&self, full_id: &str) -> Result<(), SyncError>;

    async fn start_application(&self, full_id: &str) -> Result<(), SyncError>;

    /// Id and login name of the authenticated user
    async fn current_user(&self) -> Result<WhoAmI, SyncError>;
}

/// Fail unless the device is reachable right now
pub async fn ensure_device_is_online(directory: &dyn DeviceDirectory, id: &str) -> Result<String, SyncError> {
    let device = directory.get_device(id).await?;
    if !device.is_online {
        return Err(SyncError::DeviceOffline(id.to_string()));
    }
    Ok(device.full_id)
}
