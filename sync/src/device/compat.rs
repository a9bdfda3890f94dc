//! Host OS compatibility checks

use crate::errors::SyncError;
use crate::utils::extract_version;

/// Oldest host OS release that ships `rsync`
pub const MIN_HOSTOS_RSYNC: &str = "1.1.4";

/// Ensure the host OS release is at least `min_version`
///
/// `os_release` is free-form text as reported by the directory
/// (e.g. "Resin OS 2.0.0+rev1"); the first semantic version in it is used.
pub fn ensure_host_os_compatibility(os_release: &str, min_version: &str) -> Result<(), SyncError> {
    let version = extract_version(os_release)
        .ok_or_else(|| SyncError::UnparsableVersion(os_release.to_string()))?;
    let minimum = extract_version(min_version)
        .ok_or_else(|| SyncError::UnparsableVersion(min_version.to_string()))?;

    if version < minimum {
        return Err(SyncError::IncompatibleHostOs {
            release: os_release.to_string(),
            minimum: min_version.to_string(),
        });
    }
    Ok(())
}
