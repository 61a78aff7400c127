// Requirement checker over the executable search path
// reason: which resolves PATH (and PATHEXT on Windows) like the shell does
use std::path::{Path, PathBuf};
use tracing::debug;

use relais_core::port::{RequirementChecker, RequirementError};

/// Checks executables against PATH and directories against the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct PathRequirementChecker;

impl PathRequirementChecker {
    pub fn new() -> Self {
        Self
    }
}

impl RequirementChecker for PathRequirementChecker {
    fn check_executable_resolvable(&self, name: &str) -> Result<PathBuf, RequirementError> {
        match which::which(name) {
            Ok(path) => {
                debug!(executable = %name, resolved = %path.display(), "Executable found");
                Ok(path)
            }
            Err(e) => {
                debug!(executable = %name, error = %e, "Executable lookup failed");
                Err(RequirementError::ExecutableNotFound(name.to_string()))
            }
        }
    }

    fn check_directory_reachable(&self, path: &Path) -> Result<(), RequirementError> {
        let unreachable = |reason: String| RequirementError::DirectoryUnreachable {
            path: path.to_path_buf(),
            reason,
        };

        let metadata = std::fs::metadata(path).map_err(|e| unreachable(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(unreachable("not a directory".to_string()));
        }
        std::fs::read_dir(path).map_err(|e| unreachable(e.to_string()))?;
        Ok(())
    }
}
