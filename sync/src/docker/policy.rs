//! Container creation policy for application containers
//!
//! Application containers share the name of the image they run, run
//! privileged on the host network, and always restart.

use std::collections::HashMap;

use bollard::container::Config;
use bollard::models::{HostConfig, RestartPolicy, RestartPolicyNameEnum};

/// Host directory holding per-application persistent data
pub const DATA_ROOT: &str = "/mnt/data/resin-data";

/// Command used when the image declares none
pub fn default_command() -> Vec<String> {
    vec!["/bin/bash".to_string(), "-c".to_string(), "/start".to_string()]
}

/// An application container, addressed by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub name: String,
    pub image: String,
}

impl ContainerHandle {
    /// Container for application `name`, running the image of the same name
    pub fn for_app(name: &str) -> Self {
        Self {
            name: name.to_string(),
            image: name.to_string(),
        }
    }

    fn volumes() -> HashMap<String, HashMap<(), ()>> {
        ["/data", "/lib/modules", "/lib/firmware", "/host/run/dbus"]
            .into_iter()
            .map(|path| (path.to_string(), HashMap::new()))
            .collect()
    }

    /// Bind mounts: data dir keyed by name, kernel modules, firmware, D-Bus
    pub fn binds(&self) -> Vec<String> {
        vec![
            format!("{}/{}:/data", DATA_ROOT, self.name),
            "/lib/modules:/lib/modules".to_string(),
            "/lib/firmware:/lib/firmware".to_string(),
            "/run/dbus:/host/run/dbus".to_string(),
        ]
    }

    pub fn host_config(&self) -> HostConfig {
        HostConfig {
            binds: Some(self.binds()),
            privileged: Some(true),
            network_mode: Some("host".to_string()),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::ALWAYS),
                maximum_retry_count: Some(0),
            }),
            ..Default::default()
        }
    }

    /// Full create request for this container
    pub fn config(&self, cmd: Vec<String>, env: Vec<String>) -> Config<String> {
        Config {
            image: Some(self.image.clone()),
            cmd: Some(cmd),
            env: Some(env),
            tty: Some(true),
            volumes: Some(Self::volumes()),
            host_config: Some(self.host_config()),
            ..Default::default()
        }
    }
}
