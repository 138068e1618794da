//! Top-level error type

use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::host::HostError;

/// Errors surfaced by the agent
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience alias for agent results
pub type AgentResult<T> = Result<T, AgentError>;
