pub mod command;
pub mod session;

pub use command::{
    AgentUserGroup, CommandConfig, CommandParams, Environment, Resources, User, UserFile,
};
pub use session::{SessionState, SessionSummary, TaskId};

use std::collections::BTreeMap;

use crate::operator::SessionManagerHandle;

#[derive(Clone)]
pub struct AppState {
    pub manager: SessionManagerHandle,
    pub agent_user_groups: BTreeMap<String, AgentUserGroup>,
}

impl AppState {
    pub fn new(
        manager: SessionManagerHandle,
        agent_user_groups: BTreeMap<String, AgentUserGroup>,
    ) -> Self {
        Self {
            manager,
            agent_user_groups,
        }
    }

    /// Resolve a request's user, attaching their configured agent user/group.
    pub fn user(&self, username: &str) -> User {
        User {
            username: username.to_string(),
            agent_user_group: self.agent_user_groups.get(username).cloned(),
        }
    }
}
