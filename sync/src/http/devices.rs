//! Device directory over the JSON API

use async_trait::async_trait;
use device_api::models::{ApplicationInfo, DeviceRecord, OnlineStatus, WhoAmI};

use crate::device::directory::{DeviceDirectory, DeviceInfo};
use crate::errors::SyncError;
use crate::http::client::HttpClient;

/// [`DeviceDirectory`] backed by the remote device API
pub struct HttpDeviceDirectory {
    client: HttpClient,
}

impl HttpDeviceDirectory {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceDirectory for HttpDeviceDirectory {
    async fn get_device(&self, id: &str) -> Result<DeviceInfo, SyncError> {
        let record: DeviceRecord = self.client.get(&format!("/devices/{}", id)).await?;
        DeviceInfo::from_record(record)
    }

    async fn is_online(&self, id: &str) -> Result<bool, SyncError> {
        let status: OnlineStatus = self.client.get(&format!("/devices/{}/online", id)).await?;
        Ok(status.is_online)
    }

    async fn application_container_id(&self, full_id: &str) -> Result<Option<String>, SyncError> {
        let app: ApplicationInfo = self
            .client
            .get(&format!("/devices/{}/application", full_id))
            .await?;
        Ok(app.container_id.filter(|id| !id.is_empty()))
    }

    async fn stop_application(&self, full_id: &str) -> Result<(), SyncError> {
        self.client
            .post_no_content(&format!("/devices/{}/application/stop", full_id), &serde_json::json!({}))
            .await
    }

    async fn start_application(&self, full_id: &str) -> Result<(), SyncError> {
        self.client
            .post_no_content(&format!("/devices/{}/application/start", full_id), &serde_json::json!({}))
            .await
    }

    async fn current_user(&self) -> Result<WhoAmI, SyncError> {
        self.client.get("/user/whoami").await
    }
}
