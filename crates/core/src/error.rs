// Central Error Type for the Invocation Lifecycle

use thiserror::Error;

/// Invocation-level error type
///
/// A non-zero exit status or output on stderr is never an error: both are
/// recorded in the run state for the caller to interpret.
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::domain::ConfigError),

    #[error("Requirement error: {0}")]
    Requirement(#[from] crate::port::RequirementError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] crate::port::WorkspaceError),

    #[error("Launch error: {0}")]
    Launch(#[from] crate::port::LaunchError),

    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Process timeout after {0}ms")]
    Timeout(u64),

    #[error("Capability '{capability}' is not implemented by integration '{integration}'")]
    Unimplemented {
        capability: &'static str,
        integration: String,
    },

    #[error("Integration error: {0}")]
    Integration(String),
}

/// Result type alias using InvokeError
pub type Result<T> = std::result::Result<T, InvokeError>;
