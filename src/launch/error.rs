use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchError {
    /// Bad or missing request fields; the caller can fix and resubmit.
    #[error("invalid shell request: {0}")]
    Validation(String),

    #[error("failed to provision shell: {0:#}")]
    Provisioning(anyhow::Error),

    #[error("failed to spawn shell: {0}")]
    Spawn(String),
}

impl LaunchError {
    pub fn is_validation(&self) -> bool {
        matches!(self, LaunchError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;
