use super::archive::Archive;
use super::assets::Assets;
use super::bootstrap::{BootstrapArchiveBuilder, SHELL_ENTRYPOINT_SCRIPT, SHELL_SSHD_CONFIG_FILE};
use super::credentials::KeyPair;
use super::ports::{PortRange, SHELL_PORTS};
use super::readiness::{contains_marker, ReadinessMonitor};
use crate::shared::models::AgentUserGroup;

/// Emitted by sshd once its listener is bound.
pub const SSHD_READY_MARKER: &str = "Server listening on";

/// What a kind of interactive task contributes to the shared launch
/// pipeline.
pub trait TaskCategory: Send + Sync {
    /// Key under which the primary service's port and readiness are recorded.
    fn service_name(&self) -> &'static str;

    /// Used in synthesized descriptions, e.g. `"Shell (brave-heron)"`.
    fn display_name(&self) -> &'static str;

    fn port_range(&self) -> PortRange;

    fn entrypoint(&self, port: u16) -> Vec<String>;

    fn bootstrap_archive(&self, owner: &AgentUserGroup, keys: &KeyPair) -> Archive;

    fn readiness_checks(&self) -> ReadinessMonitor;
}

#[derive(Debug, Clone, Copy)]
pub struct ShellCategory {
    archive_builder: BootstrapArchiveBuilder,
}

impl ShellCategory {
    pub fn new(assets: Assets) -> Self {
        Self {
            archive_builder: BootstrapArchiveBuilder::new(assets),
        }
    }
}

impl TaskCategory for ShellCategory {
    fn service_name(&self) -> &'static str {
        "shell"
    }

    fn display_name(&self) -> &'static str {
        "Shell"
    }

    fn port_range(&self) -> PortRange {
        SHELL_PORTS
    }

    fn entrypoint(&self, port: u16) -> Vec<String> {
        vec![
            SHELL_ENTRYPOINT_SCRIPT.to_string(),
            "-f".to_string(),
            SHELL_SSHD_CONFIG_FILE.to_string(),
            "-p".to_string(),
            port.to_string(),
            "-D".to_string(),
            "-e".to_string(),
        ]
    }

    fn bootstrap_archive(&self, owner: &AgentUserGroup, keys: &KeyPair) -> Archive {
        self.archive_builder.build(owner, keys)
    }

    fn readiness_checks(&self) -> ReadinessMonitor {
        let mut monitor = ReadinessMonitor::new();
        monitor.register(self.service_name(), contains_marker(SSHD_READY_MARKER));
        monitor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_entrypoint_runs_sshd_in_foreground_on_port() {
        let shell = ShellCategory::new(Assets::load().unwrap());
        assert_eq!(
            shell.entrypoint(3201),
            vec![
                "/run/determined/ssh/shell-entrypoint.sh",
                "-f",
                "/run/determined/ssh/sshd_config",
                "-p",
                "3201",
                "-D",
                "-e",
            ]
        );
    }

    #[test]
    fn shell_registers_single_sshd_check() {
        let shell = ShellCategory::new(Assets::load().unwrap());
        let mut monitor = shell.readiness_checks();
        assert_eq!(monitor.services().collect::<Vec<_>>(), vec!["shell"]);
        monitor.observe("Server listening on 0.0.0.0 port 3201.");
        assert!(monitor.is_ready("shell"));
    }
}
