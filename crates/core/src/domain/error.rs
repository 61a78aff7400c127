// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid invoker state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invocation has not completed")]
    NotCompleted,
}

/// Rejected invocation configuration (raised at construction, never retried)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Executable must not be empty")]
    EmptyExecutable,

    #[error("Workspace path '{0}' given while workspace use is disabled")]
    WorkspacePathWithoutWorkspace(String),

    #[error("Workspace removal requested while workspace use is disabled")]
    RemovalWithoutWorkspace,

    #[error("Timeout must be greater than zero")]
    ZeroTimeout,
}

pub type Result<T> = std::result::Result<T, DomainError>;
