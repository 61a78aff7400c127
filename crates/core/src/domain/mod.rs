// Domain Layer - Invocation configuration, command lines and run state

pub mod command_line;
pub mod config;
pub mod error;
pub mod run_state;

// Re-exports
pub use command_line::CommandLine;
pub use config::{InvocationConfig, InvocationConfigBuilder, LaunchMode};
pub use error::{ConfigError, DomainError};
pub use run_state::{InvocationReport, InvokerState, RunState};
