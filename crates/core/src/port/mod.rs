// Port Layer - Interfaces for external dependencies

pub mod process_launcher;
pub mod requirement_checker;
pub mod scratch_workspace;
pub mod time_provider;
pub mod tool_integration;

// Re-exports
pub use process_launcher::{
    CapturedOutput, ChildProcess, FinishedChild, LaunchError, LaunchRequest, ProcessLauncher,
};
pub use requirement_checker::{RequirementChecker, RequirementError};
pub use scratch_workspace::{ScratchWorkspace, WorkspaceError};
pub use time_provider::TimeProvider;
pub use tool_integration::{Diagnostics, GenericTool, ToolIntegration};
