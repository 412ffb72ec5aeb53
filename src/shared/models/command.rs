use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::launch::archive::{ArchiveEntry, EntryKind};

/// OS identity that owns injected files and runs the session process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AgentUserGroup {
    pub user: String,
    pub uid: u32,
    pub group: String,
    pub gid: u32,
}

impl Default for AgentUserGroup {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            uid: 0,
            group: "root".to_string(),
            gid: 0,
        }
    }
}

impl AgentUserGroup {
    pub fn owned_entry(
        &self,
        path: impl Into<String>,
        content: impl Into<Vec<u8>>,
        mode: u32,
        kind: EntryKind,
    ) -> ArchiveEntry {
        ArchiveEntry {
            path: path.into(),
            content: content.into(),
            mode,
            kind,
            uid: self.uid,
            gid: self.gid,
            user_name: self.user.clone(),
            group_name: self.group.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub agent_user_group: Option<AgentUserGroup>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            agent_user_group: None,
        }
    }
}

/// Raw launch parameters as sent by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CommandParams {
    #[schema(value_type = Object)]
    pub config: Option<serde_json::Value>,
    #[schema(value_type = Object)]
    pub data: serde_json::Map<String, serde_json::Value>,
    pub user_files: Vec<UserFile>,
}

/// A file supplied by the client, placed relative to the working directory.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserFile {
    pub path: String,
    /// Base64-encoded file content.
    pub content: String,
    #[serde(default = "default_user_file_mode")]
    pub mode: u32,
}

fn default_user_file_mode() -> u32 {
    0o644
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CommandConfig {
    pub description: String,
    pub environment: Environment,
    pub entrypoint: Vec<String>,
    pub resources: Resources,
    pub work_dir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Environment {
    pub image: String,
    pub environment_variables: BTreeMap<String, String>,
    pub ports: BTreeMap<String, u16>,
    #[schema(value_type = Object)]
    pub pod_spec: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Resources {
    pub slots: i32,
    pub resource_pool: String,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            slots: 0,
            resource_pool: "default".to_string(),
        }
    }
}

impl CommandConfig {
    /// Structural checks run before a session is spawned. Returns every
    /// violation found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.description.trim().is_empty() {
            errors.push("description must not be empty".to_string());
        }
        if self.environment.image.trim().is_empty() {
            errors.push("environment.image must not be empty".to_string());
        }
        if self.entrypoint.is_empty() {
            errors.push("entrypoint must not be empty".to_string());
        }
        if self.resources.slots < 0 {
            errors.push(format!(
                "resources.slots must be non-negative, got {}",
                self.resources.slots
            ));
        }
        for (service, port) in &self.environment.ports {
            if *port == 0 {
                errors.push(format!("environment.ports.{service} must be non-zero"));
            }
        }
        for name in self.environment.environment_variables.keys() {
            if name.is_empty() || name.contains('=') {
                errors.push(format!("invalid environment variable name {name:?}"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> CommandConfig {
        CommandConfig {
            description: "Shell (calm-otter)".to_string(),
            environment: Environment {
                image: "ubuntu:22.04".to_string(),
                ..Default::default()
            },
            entrypoint: vec!["/bin/true".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_collects_every_violation() {
        let mut config = valid_config();
        config.description.clear();
        config.resources.slots = -1;
        config.environment.ports.insert("shell".to_string(), 0);
        config
            .environment
            .environment_variables
            .insert("A=B".to_string(), "x".to_string());

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4, "{errors:?}");
    }

    #[test]
    fn unknown_config_fields_are_rejected() {
        let raw = serde_json::json!({ "description": "x", "bogus": true });
        assert!(serde_json::from_value::<CommandConfig>(raw).is_err());
    }

    #[test]
    fn user_file_mode_defaults_to_0644() {
        let file: UserFile =
            serde_json::from_value(serde_json::json!({ "path": "a.txt", "content": "" }))
                .unwrap();
        assert_eq!(file.mode, 0o644);
    }
}
