use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::shared::models::AgentUserGroup;

pub const CONFIG_PATH_ENV: &str = "SHELLMGR_CONFIG";
pub const HOST_ENV: &str = "SHELLMGR_HOST";
pub const PORT_ENV: &str = "SHELLMGR_PORT";
pub const LOG_DIR_ENV: &str = "SHELLMGR_LOG_DIR";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    Bridge,
    Host,
}

/// Defaults applied to every task container unless the request overrides them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskContainerDefaults {
    pub image: String,
    pub environment_variables: BTreeMap<String, String>,
    pub pod_spec: Option<serde_json::Value>,
    pub network_mode: NetworkMode,
}

impl Default for TaskContainerDefaults {
    fn default() -> Self {
        Self {
            image: "ubuntu:22.04".to_string(),
            environment_variables: BTreeMap::new(),
            pod_spec: None,
            network_mode: NetworkMode::Bridge,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_dir: String,
    pub ask_timeout_ms: u64,
    pub default_agent_user_group: AgentUserGroup,
    pub agent_user_groups: BTreeMap<String, AgentUserGroup>,
    pub task_container_defaults: TaskContainerDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_dir: "./logs".to_string(),
            ask_timeout_ms: 5_000,
            default_agent_user_group: AgentUserGroup::default(),
            agent_user_groups: BTreeMap::new(),
            task_container_defaults: TaskContainerDefaults::default(),
        }
    }
}

impl Config {
    /// Load `.env`, then the YAML file named by `SHELLMGR_CONFIG` if set,
    /// then apply environment overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var(HOST_ENV) {
            self.host = host;
        }
        if let Ok(port) = std::env::var(PORT_ENV) {
            self.port = port
                .parse()
                .with_context(|| format!("{PORT_ENV} must be a port number, got {port:?}"))?;
        }
        if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
            self.log_dir = log_dir;
        }
        Ok(())
    }

    pub fn ask_timeout(&self) -> Duration {
        Duration::from_millis(self.ask_timeout_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
