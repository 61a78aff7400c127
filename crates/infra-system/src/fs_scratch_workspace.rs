// Filesystem scratch workspace
// reason: tempfile creates uniquely named directories atomically; they are kept
// on disk so the invoker decides when they go away
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use relais_core::application::constants::SCRATCH_DIR_PREFIX;
use relais_core::port::scratch_workspace::validate_scratch_name;
use relais_core::port::{ScratchWorkspace, WorkspaceError};

/// Scratch workspace backed by real directories
///
/// Directories are created below `root` (the system temp area by default).
/// Reserved file paths are remembered per instance, so a second reservation
/// of the same path collides even before anything is written there.
pub struct FsScratchWorkspace {
    root: PathBuf,
    reserved: Mutex<HashSet<PathBuf>>,
}

impl FsScratchWorkspace {
    pub fn new() -> Self {
        Self::with_root(std::env::temp_dir())
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            reserved: Mutex::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for FsScratchWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl ScratchWorkspace for FsScratchWorkspace {
    fn create_scratch_directory(&self) -> Result<PathBuf, WorkspaceError> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_DIR_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| WorkspaceError::ResourceCreation {
                path: self.root.clone(),
                reason: e.to_string(),
            })?;
        // Lifetime is managed by teardown, not by the guard
        let path = dir.keep();
        debug!(path = %path.display(), "Scratch directory created");
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

        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        if reserved.contains(&path) || path.symlink_metadata().is_ok() {
            return Err(WorkspaceError::PathCollision(path));
        }
        reserved.insert(path.clone());
        Ok(path)
    }

    fn write_scratch_file(
        &self,
        name: &str,
        contents: &[u8],
        base_dir: Option<&Path>,
    ) -> Result<PathBuf, WorkspaceError> {
        let path = self.reserve_scratch_file_path(name, base_dir)?;
        std::fs::write(&path, contents).map_err(|e| WorkspaceError::io(&path, e))?;
        debug!(path = %path.display(), bytes = contents.len(), "Scratch file written");
        Ok(path)
    }

    fn remove_recursive(&self, path: &Path) -> Result<(), WorkspaceError> {
        let metadata = match path.symlink_metadata() {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(WorkspaceError::path_not_found(path))
            }
            Err(e) => return Err(WorkspaceError::io(path, e)),
        };

        let result = if metadata.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        result.map_err(|e| WorkspaceError::io(path, e))?;

        self.reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|p| !p.starts_with(path));
        debug!(path = %path.display(), "Removed");
        Ok(())
    }

    fn clear_contents(&self, path: &Path) -> Result<(), WorkspaceError> {
        if !path.is_dir() {
            return Err(WorkspaceError::directory_not_found(path));
        }
        let entries = std::fs::read_dir(path).map_err(|e| WorkspaceError::io(path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| WorkspaceError::io(path, e))?;
            self.remove_recursive(&entry.path())?;
        }
        Ok(())
    }
}
