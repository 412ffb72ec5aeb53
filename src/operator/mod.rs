mod mailbox;
mod session_actor;
mod session_manager;

pub use mailbox::{AskError, MAILBOX_CAPACITY};
pub use session_actor::{SessionActor, SessionHandle, SessionMessage};
pub use session_manager::{
    ApiCall, ApiMethod, ApiReply, ManagerError, ManagerMessage, SessionManager,
    SessionManagerHandle,
};

use anyhow::Result;

use crate::launch::{Assets, LaunchPipeline};
use crate::shared::config::Config;

/// Start the shell session manager for `config`.
pub fn start(config: &Config) -> Result<SessionManagerHandle> {
    tracing::info!("Starting shell session manager...");

    let assets = Assets::load()?;
    let pipeline = LaunchPipeline::shell(config, assets);
    Ok(SessionManager::spawn(pipeline, config.ask_timeout()))
}
