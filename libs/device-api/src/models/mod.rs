//! API models

use serde::{Deserialize, Serialize};

/// Device record as returned by the directory
///
/// Every field is optional on the wire. Callers decide which ones are
/// required before trusting the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Host OS release, e.g. "Resin OS 2.0.0+rev1"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,

    #[serde(default)]
    pub is_online: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRef>,
}

/// Reference to the user owning a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(rename = "__id")]
    pub id: String,
}

/// Online probe response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineStatus {
    pub is_online: bool,
}

/// Running application on a device
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationInfo {
    #[serde(default, rename = "containerId", skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,

    #[serde(default, rename = "appId", skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// Authenticated user identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoAmI {
    pub id: String,
    pub username: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: String,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
