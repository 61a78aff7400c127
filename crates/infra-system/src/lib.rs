// Relais Infrastructure - System Adapters
// Implements: ScratchWorkspace, RequirementChecker, ProcessLauncher, ToolIntegration

pub mod file_harvester;
pub mod fs_scratch_workspace;
pub mod path_requirement_checker;
pub mod tokio_process_launcher;

use std::path::PathBuf;
use std::sync::Arc;

use relais_core::port::time_provider::SystemTimeProvider;
use relais_core::InvokerPorts;

pub use file_harvester::{harvest_directory, FileHarvester};
pub use fs_scratch_workspace::FsScratchWorkspace;
pub use path_requirement_checker::PathRequirementChecker;
pub use tokio_process_launcher::TokioProcessLauncher;

/// Production ports with scratch directories under the system temp area
pub fn system_ports() -> InvokerPorts {
    ports_with_workspace(FsScratchWorkspace::new())
}

/// Production ports with scratch directories under `root`
pub fn system_ports_in(root: impl Into<PathBuf>) -> InvokerPorts {
    ports_with_workspace(FsScratchWorkspace::with_root(root))
}

fn ports_with_workspace(workspace: FsScratchWorkspace) -> InvokerPorts {
    InvokerPorts {
        workspace: Arc::new(workspace),
        requirements: Arc::new(PathRequirementChecker::new()),
        launcher: Arc::new(TokioProcessLauncher::new()),
        time_provider: Arc::new(SystemTimeProvider),
    }
}
