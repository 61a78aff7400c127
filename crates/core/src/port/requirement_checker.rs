// Requirement Checker Port
// Preconditions verified before launch when requirement checking is enabled

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Unmet precondition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequirementError {
    #[error("Can't find executable '{0}'")]
    ExecutableNotFound(String),

    #[error("Can't access working directory ({path}): {reason}")]
    DirectoryUnreachable { path: PathBuf, reason: String },
}

/// Requirement checker trait
///
/// Implementations:
/// - PathRequirementChecker: search-path lookup and filesystem probing
/// - MockRequirementChecker: fixed answers for tests
pub trait RequirementChecker: Send + Sync {
    /// Resolve `name` against the executable search mechanism
    ///
    /// # Errors
    /// - RequirementError::ExecutableNotFound carrying the unresolved name
    fn check_executable_resolvable(&self, name: &str) -> Result<PathBuf, RequirementError>;

    /// Check that `path` exists, is a directory and can be listed
    ///
    /// # Errors
    /// - RequirementError::DirectoryUnreachable
    fn check_directory_reachable(&self, path: &Path) -> Result<(), RequirementError>;

    /// Resolve `name`, or None when it is not on the search path
    fn resolve_executable(&self, name: &str) -> Option<PathBuf> {
        self.check_executable_resolvable(name).ok()
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::{Arc, Mutex};

    /// Mock requirement checker with a fixed set of known executables
    #[derive(Clone, Default)]
    pub struct MockRequirementChecker {
        executables: BTreeMap<String, PathBuf>,
        unreachable: BTreeSet<PathBuf>,
        checks: Arc<Mutex<Vec<String>>>,
    }

    impl MockRequirementChecker {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `name` resolvable as `/usr/bin/<name>`
        pub fn with_executable(mut self, name: &str) -> Self {
            self.executables
                .insert(name.to_string(), PathBuf::from("/usr/bin").join(name));
            self
        }

        pub fn with_unreachable_dir(mut self, path: impl Into<PathBuf>) -> Self {
            self.unreachable.insert(path.into());
            self
        }

        /// Names and directories checked so far, in order
        pub fn checks(&self) -> Vec<String> {
            self.checks.lock().unwrap().clone()
        }
    }

    impl RequirementChecker for MockRequirementChecker {
        fn check_executable_resolvable(&self, name: &str) -> Result<PathBuf, RequirementError> {
            self.checks.lock().unwrap().push(format!("exe:{}", name));
            self.executables
                .get(name)
                .cloned()
                .ok_or_else(|| RequirementError::ExecutableNotFound(name.to_string()))
        }

        fn check_directory_reachable(&self, path: &Path) -> Result<(), RequirementError> {
            self.checks
                .lock()
                .unwrap()
                .push(format!("dir:{}", path.display()));
            if self.unreachable.contains(path) {
                return Err(RequirementError::DirectoryUnreachable {
                    path: path.to_path_buf(),
                    reason: "mock unreachable".to_string(),
                });
            }
            Ok(())
        }
    }
}
