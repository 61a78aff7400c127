// Output file harvesting
use std::path::{Path, PathBuf};
use tracing::debug;

use relais_core::port::scratch_workspace::validate_scratch_name;
use relais_core::port::{Diagnostics, ToolIntegration, WorkspaceError};
use relais_core::{InvokeError, Result};

/// Read files from `dir` into a name -> contents map
///
/// With `names` empty every regular file directly inside `dir` is read.
/// Otherwise exactly the named files are read, and a missing one is an
/// error. Names must be single path components inside `dir`. Contents are
/// decoded lossily as UTF-8.
pub fn harvest_directory(dir: &Path, names: &[String]) -> std::result::Result<Diagnostics, WorkspaceError> {
    if !dir.is_dir() {
        return Err(WorkspaceError::directory_not_found(dir));
    }

    let paths: Vec<(String, PathBuf)> = if names.is_empty() {
        let entries = std::fs::read_dir(dir).map_err(|e| WorkspaceError::io(dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| WorkspaceError::io(dir, e))?;
            let path = entry.path();
            if path.is_file() {
                files.push((entry.file_name().to_string_lossy().into_owned(), path));
            }
        }
        files
    } else {
        let mut files = Vec::with_capacity(names.len());
        for name in names {
            validate_scratch_name(name)?;
            files.push((name.clone(), dir.join(name)));
        }
        files
    };

    let mut harvested = Diagnostics::new();
    for (name, path) in paths {
        if !path.is_file() {
            return Err(WorkspaceError::path_not_found(path));
        }
        let bytes = std::fs::read(&path).map_err(|e| WorkspaceError::io(&path, e))?;
        debug!(file = %path.display(), bytes = bytes.len(), "Harvested");
        harvested.insert(name, String::from_utf8_lossy(&bytes).into_owned());
    }
    Ok(harvested)
}

/// Tool integration that collects designated output files after a run
#[derive(Debug, Clone, Default)]
pub struct FileHarvester {
    names: Vec<String>,
}

impl FileHarvester {
    /// Harvest `names`, or every regular file when empty
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl ToolIntegration for FileHarvester {
    fn name(&self) -> &str {
        "file-harvester"
    }

    fn extract_diagnostics(&self, workspace: Option<&Path>) -> Result<Diagnostics> {
        let dir = workspace.ok_or_else(|| {
            InvokeError::Integration("file harvesting needs a workspace".to_string())
        })?;
        Ok(harvest_directory(dir, &self.names)?)
    }
}
