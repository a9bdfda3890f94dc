//! Utility functions

use std::sync::OnceLock;

use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};

/// Version information for the tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Short form of a device id as shown to users
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(7) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([0-9]+)\.([0-9]+)\.([0-9]+)(?:([-+])([^\s]+))?").expect("valid version regex")
    })
}

/// Find the first `MAJOR.MINOR.PATCH[(-|+)suffix]` token in `text`
///
/// Numeric parts may carry leading zeros (`17.06.0-ce`).
pub fn extract_version(text: &str) -> Option<Version> {
    let caps = version_regex().captures(text)?;
    let major = caps[1].parse().ok()?;
    let minor = caps[2].parse().ok()?;
    let patch = caps[3].parse().ok()?;

    let mut version = Version::new(major, minor, patch);
    if let (Some(sep), Some(suffix)) = (caps.get(4), caps.get(5)) {
        match sep.as_str() {
            "-" => {
                let (pre, build) = suffix.as_str().split_once('+').unwrap_or((suffix.as_str(), ""));
                version.pre = Prerelease::new(pre).unwrap_or(Prerelease::EMPTY);
                version.build = BuildMetadata::new(build).unwrap_or(BuildMetadata::EMPTY);
            }
            _ => {
                version.build = BuildMetadata::new(suffix.as_str()).unwrap_or(BuildMetadata::EMPTY);
            }
        }
    }
    Some(version)
}

/// Quote `arg` for a POSIX shell
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
