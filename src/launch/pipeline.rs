use base64::Engine;
use std::collections::BTreeMap;
use std::path::{Component, Path};
use std::sync::Arc;
use tracing::{error, info};

use super::archive::{Archive, EntryKind};
use super::assets::Assets;
use super::category::{ShellCategory, TaskCategory};
use super::credentials::{CredentialProvisioner, SshKeyProvisioner};
use super::error::{LaunchError, Result};
use super::ports::{PortAllocator, RandomPortAllocator, ReservingPortAllocator};
use super::readiness::ReadinessMonitor;
use crate::shared::config::{Config, NetworkMode, TaskContainerDefaults};
use crate::shared::models::{AgentUserGroup, CommandConfig, CommandParams, TaskId, User};
use crate::shared::wordlist;

pub const PASSPHRASE_KEY: &str = "passphrase";
pub const PRIVATE_KEY_METADATA: &str = "privateKey";
pub const PUBLIC_KEY_METADATA: &str = "publicKey";

#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub params: CommandParams,
    pub user: User,
}

/// Everything needed to spawn a session: the resolved config plus the
/// artifacts generated for it.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub task_id: TaskId,
    pub config: CommandConfig,
    pub bootstrap: Archive,
    pub user_files: Archive,
    pub metadata: BTreeMap<String, String>,
    pub readiness: ReadinessMonitor,
    pub service_address: String,
    pub owner: String,
    pub agent_user_group: AgentUserGroup,
}

pub struct LaunchPipeline {
    category: Arc<dyn TaskCategory>,
    provisioner: Arc<dyn CredentialProvisioner>,
    ports: Arc<dyn PortAllocator>,
    defaults: TaskContainerDefaults,
    default_agent_user_group: AgentUserGroup,
}

impl LaunchPipeline {
    pub fn new(
        category: Arc<dyn TaskCategory>,
        provisioner: Arc<dyn CredentialProvisioner>,
        ports: Arc<dyn PortAllocator>,
        defaults: TaskContainerDefaults,
        default_agent_user_group: AgentUserGroup,
    ) -> Self {
        Self {
            category,
            provisioner,
            ports,
            defaults,
            default_agent_user_group,
        }
    }

    /// Shell pipeline wired from configuration. Host networking shares one
    /// port namespace between sessions, so ports are reserved there.
    pub fn shell(config: &Config, assets: Assets) -> Self {
        let ports: Arc<dyn PortAllocator> = match config.task_container_defaults.network_mode {
            NetworkMode::Host => Arc::new(ReservingPortAllocator::new()),
            NetworkMode::Bridge => Arc::new(RandomPortAllocator),
        };
        Self::new(
            Arc::new(ShellCategory::new(assets)),
            Arc::new(SshKeyProvisioner),
            ports,
            config.task_container_defaults.clone(),
            config.default_agent_user_group.clone(),
        )
    }

    pub fn release_ports(&self, ports: &BTreeMap<String, u16>) {
        for port in ports.values() {
            self.ports.release(*port);
        }
    }

    pub fn launch(&self, request: LaunchRequest) -> Result<SessionSpec> {
        let LaunchRequest { params, user } = request;

        let files = decode_user_files(&params)?;
        let mut config = parse_config(params.config)?;

        let agent_user_group = user
            .agent_user_group
            .clone()
            .unwrap_or_else(|| self.default_agent_user_group.clone());

        let passphrase = params
            .data
            .get(PASSPHRASE_KEY)
            .and_then(serde_json::Value::as_str);

        let keys = self.provisioner.generate(passphrase).map_err(|e| {
            error!(owner = %user.username, "Failed to generate session key pair: {e:#}");
            LaunchError::Provisioning(e)
        })?;

        info!(owner = %user.username, "Creating {}", self.category.service_name());

        if config.description.trim().is_empty() {
            config.description = format!(
                "{} ({})",
                self.category.display_name(),
                wordlist::generate_name()
            );
        }

        let task_id = TaskId::new();
        let service_address = format!("/proxy/{task_id}/");

        let range = self.category.port_range();
        let port = self.ports.allocate(range).ok_or_else(|| {
            error!(%task_id, "No free port in {}-{}", range.min, range.max);
            LaunchError::Provisioning(anyhow::anyhow!(
                "no free port in range {}-{}",
                range.min,
                range.max
            ))
        })?;
        config.environment.ports =
            BTreeMap::from([(self.category.service_name().to_string(), port)]);
        config.entrypoint = self.category.entrypoint(port);

        self.apply_container_defaults(&mut config);

        let bootstrap = self.category.bootstrap_archive(&agent_user_group, &keys);
        let user_files = Archive::new(
            files
                .into_iter()
                .map(|(path, content, mode)| {
                    agent_user_group.owned_entry(path, content, mode, EntryKind::Regular)
                })
                .collect(),
        );

        let mut problems = config.validate().err().unwrap_or_default();
        problems.extend(validate_user_files(&user_files));
        if !problems.is_empty() {
            self.release_ports(&config.environment.ports);
            return Err(LaunchError::Validation(problems.join("; ")));
        }

        let metadata = BTreeMap::from([
            (
                PRIVATE_KEY_METADATA.to_string(),
                String::from_utf8_lossy(&keys.private_key).into_owned(),
            ),
            (
                PUBLIC_KEY_METADATA.to_string(),
                String::from_utf8_lossy(&keys.public_key).into_owned(),
            ),
        ]);

        Ok(SessionSpec {
            task_id,
            config,
            bootstrap,
            user_files,
            metadata,
            readiness: self.category.readiness_checks(),
            service_address,
            owner: user.username,
            agent_user_group,
        })
    }

    fn apply_container_defaults(&self, config: &mut CommandConfig) {
        let environment = &mut config.environment;
        if environment.image.trim().is_empty() {
            environment.image = self.defaults.image.clone();
        }
        if environment.pod_spec.is_none() {
            environment.pod_spec = self.defaults.pod_spec.clone();
        }
        for (name, value) in &self.defaults.environment_variables {
            environment
                .environment_variables
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

fn parse_config(raw: Option<serde_json::Value>) -> Result<CommandConfig> {
    match raw {
        None | Some(serde_json::Value::Null) => Ok(CommandConfig::default()),
        Some(raw) => serde_json::from_value(raw)
            .map_err(|e| LaunchError::Validation(format!("invalid config: {e}"))),
    }
}

fn decode_user_files(params: &CommandParams) -> Result<Vec<(String, Vec<u8>, u32)>> {
    params
        .user_files
        .iter()
        .map(|file| {
            let content = base64::engine::general_purpose::STANDARD
                .decode(&file.content)
                .map_err(|e| {
                    LaunchError::Validation(format!(
                        "user file {:?} is not valid base64: {e}",
                        file.path
                    ))
                })?;
            Ok((file.path.clone(), content, file.mode))
        })
        .collect()
}

fn validate_user_files(files: &Archive) -> Vec<String> {
    let mut errors = Vec::new();
    for file in files.entries() {
        let path = Path::new(&file.path);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if file.path.is_empty() || escapes {
            errors.push(format!(
                "user file path {:?} must be relative and stay inside the working directory",
                file.path
            ));
        }
        if file.mode > 0o7777 {
            errors.push(format!("user file {:?} has invalid mode {:o}", file.path, file.mode));
        }
    }
    errors
}
