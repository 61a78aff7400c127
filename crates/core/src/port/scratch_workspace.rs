// Scratch Workspace Port
// Abstraction over "create unique temp directory", "reserve non-colliding path"
// and "recursively delete path"

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Scratch workspace errors
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Could not create scratch resource at {path}: {reason}")]
    ResourceCreation { path: PathBuf, reason: String },

    #[error("Scratch path already exists: {0}")]
    PathCollision(PathBuf),

    #[error("Invalid scratch file name '{0}': must be a single path component")]
    InvalidName(String),

    #[error("{expected} not found: {path}")]
    NotFound { path: PathBuf, expected: &'static str },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkspaceError {
    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        WorkspaceError::NotFound {
            path: path.into(),
            expected: "Path",
        }
    }

    pub fn directory_not_found(path: impl Into<PathBuf>) -> Self {
        WorkspaceError::NotFound {
            path: path.into(),
            expected: "Directory",
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WorkspaceError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Check that `name` stays inside whatever directory it is joined to
///
/// Absolute paths, `..`, `.` and nested paths are rejected.
pub fn validate_scratch_name(name: &str) -> Result<(), WorkspaceError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(WorkspaceError::InvalidName(name.to_string())),
    }
}

/// Scratch workspace provider
///
/// Implementations:
/// - FsScratchWorkspace: real directories under the system temp area
/// - MockScratchWorkspace: in-memory bookkeeping for tests
pub trait ScratchWorkspace: Send + Sync {
    /// Create a new, empty, uniquely named directory
    ///
    /// # Errors
    /// - WorkspaceError::ResourceCreation if no directory could be created
    fn create_scratch_directory(&self) -> Result<PathBuf, WorkspaceError>;

    /// Reserve a path for `name` inside `base_dir` (or a fresh scratch
    /// directory). The file itself is not created.
    ///
    /// # Errors
    /// - WorkspaceError::InvalidName if `name` is not a single path component
    /// - WorkspaceError::PathCollision if the path exists or was already reserved
    fn reserve_scratch_file_path(
        &self,
        name: &str,
        base_dir: Option<&Path>,
    ) -> Result<PathBuf, WorkspaceError>;

    /// Reserve several paths, all rooted in the same directory
    fn reserve_scratch_file_paths(
        &self,
        names: &[&str],
        base_dir: Option<&Path>,
    ) -> Result<Vec<PathBuf>, WorkspaceError> {
        let dir = match base_dir {
            Some(dir) => dir.to_path_buf(),
            None => self.create_scratch_directory()?,
        };
        names
            .iter()
            .map(|name| self.reserve_scratch_file_path(name, Some(&dir)))
            .collect()
    }

    /// Reserve a path for `name` and write `contents` to it
    fn write_scratch_file(
        &self,
        name: &str,
        contents: &[u8],
        base_dir: Option<&Path>,
    ) -> Result<PathBuf, WorkspaceError>;

    /// Delete a file, or a directory and everything below it
    ///
    /// # Errors
    /// - WorkspaceError::NotFound if `path` does not exist
    fn remove_recursive(&self, path: &Path) -> Result<(), WorkspaceError>;

    /// Delete every entry inside a directory, keeping the directory
    ///
    /// # Errors
    /// - WorkspaceError::NotFound if `path` is missing or is not a directory
    fn clear_contents(&self, path: &Path) -> Result<(), WorkspaceError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct MockFs {
        // path -> is_dir
        entries: BTreeMap<PathBuf, bool>,
        reserved: Vec<PathBuf>,
        created_dirs: Vec<PathBuf>,
        removed: Vec<PathBuf>,
        counter: usize,
    }

    /// In-memory scratch workspace for testing
    #[derive(Clone, Default)]
    pub struct MockScratchWorkspace {
        fs: Arc<Mutex<MockFs>>,
        fail_creation: bool,
    }

    impl MockScratchWorkspace {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every directory creation fails
        pub fn failing() -> Self {
            Self {
                fail_creation: true,
                ..Self::default()
            }
        }

        /// Register an existing directory (e.g. a caller-supplied workspace)
        pub fn add_dir(&self, path: impl Into<PathBuf>) {
            self.fs.lock().unwrap().entries.insert(path.into(), true);
        }

        pub fn add_file(&self, path: impl Into<PathBuf>) {
            self.fs.lock().unwrap().entries.insert(path.into(), false);
        }

        pub fn exists(&self, path: &Path) -> bool {
            self.fs.lock().unwrap().entries.contains_key(path)
        }

        pub fn created_dirs(&self) -> Vec<PathBuf> {
            self.fs.lock().unwrap().created_dirs.clone()
        }

        pub fn removed(&self) -> Vec<PathBuf> {
            self.fs.lock().unwrap().removed.clone()
        }
    }

    impl ScratchWorkspace for MockScratchWorkspace {
        fn create_scratch_directory(&self) -> Result<PathBuf, WorkspaceError> {
            let mut fs = self.fs.lock().unwrap();
            fs.counter += 1;
            let path = PathBuf::from(format!("/mock-tmp/scratch-{}", fs.counter));
            if self.fail_creation {
                return Err(WorkspaceError::ResourceCreation {
                    path,
                    reason: "mock creation failure".to_string(),
                });
            }
            fs.entries.insert(path.clone(), true);
            fs.created_dirs.push(path.clone());
            Ok(path)
        }

        fn reserve_scratch_file_path(
            &self,
            name: &str,
            base_dir: Option<&Path>,
        ) -> Result<PathBuf, WorkspaceError> {
            validate_scratch_name(name)?;
            let dir = match base_dir {
                Some(dir) => dir.to_path_buf(),
                None => self.create_scratch_directory()?,
            };
            let path = dir.join(name);
            let mut fs = self.fs.lock().unwrap();
            if fs.entries.contains_key(&path) || fs.reserved.contains(&path) {
                return Err(WorkspaceError::PathCollision(path));
            }
            fs.reserved.push(path.clone());
            Ok(path)
        }

        fn write_scratch_file(
            &self,
            name: &str,
            _contents: &[u8],
            base_dir: Option<&Path>,
        ) -> Result<PathBuf, WorkspaceError> {
            let path = self.reserve_scratch_file_path(name, base_dir)?;
            self.add_file(path.clone());
            Ok(path)
        }

        fn remove_recursive(&self, path: &Path) -> Result<(), WorkspaceError> {
            let mut fs = self.fs.lock().unwrap();
            if !fs.entries.contains_key(path) {
                return Err(WorkspaceError::path_not_found(path));
            }
            fs.entries.retain(|p, _| !p.starts_with(path));
            fs.removed.push(path.to_path_buf());
            Ok(())
        }

        fn clear_contents(&self, path: &Path) -> Result<(), WorkspaceError> {
            let mut fs = self.fs.lock().unwrap();
            if fs.entries.get(path) != Some(&true) {
                return Err(WorkspaceError::directory_not_found(path));
            }
            fs.entries.retain(|p, _| p == path || !p.starts_with(path));
            Ok(())
        }
    }
}
