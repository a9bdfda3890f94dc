//! Container environment validation

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::SyncError;

/// Validates `KEY=VALUE` environment entries
pub trait EnvValidator: Send + Sync {
    fn validate(&self, env: &[String]) -> Result<Vec<String>, SyncError>;
}

/// Accepts entries whose key is a portable shell identifier
#[derive(Debug, Clone, Default)]
pub struct KeyValueEnvValidator;

fn entry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*=").expect("valid env regex"))
}

impl EnvValidator for KeyValueEnvValidator {
    fn validate(&self, env: &[String]) -> Result<Vec<String>, SyncError> {
        env.iter()
            .map(|entry| {
                if entry_regex().is_match(entry) {
                    Ok(entry.clone())
                } else {
                    Err(SyncError::InvalidEnvVar(entry.clone()))
                }
            })
            .collect()
    }
}
