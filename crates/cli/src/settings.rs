//! Layered settings: defaults, TOML file, `RELAIS_*` environment, then flags

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use relais_core::application::constants::DEFAULT_TERMINATION_GRACE;
use relais_core::domain::{InvocationConfig, LaunchMode};

const ENV_PREFIX: &str = "RELAIS";
const CONFIG_FILE_NAME: &str = "relais.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub use_workspace: bool,
    /// Explicit workspace directory (used as-is, never created)
    pub workspace: Option<PathBuf>,
    /// Where generated scratch directories go (system temp area when unset)
    pub scratch_root: Option<PathBuf>,
    pub remove_workspace: bool,
    pub check_requirements: bool,
    pub launch_mode: LaunchMode,
    pub timeout_secs: Option<f64>,
    pub termination_grace_secs: f64,
    pub env: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_workspace: true,
            workspace: None,
            scratch_root: None,
            remove_workspace: false,
            check_requirements: false,
            launch_mode: LaunchMode::Shell,
            timeout_secs: None,
            termination_grace_secs: DEFAULT_TERMINATION_GRACE.as_secs_f64(),
            env: BTreeMap::new(),
        }
    }
}

/// `<config_dir>/relais/relais.toml`
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "relais")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

impl Settings {
    /// Load settings from `file` (must exist) or the default location (optional),
    /// then the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match file {
            Some(path) => {
                builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
            }
            None => {
                if let Some(path) = default_config_path() {
                    builder = builder.add_source(config::File::from(path).required(false));
                }
            }
        }

        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn timeout(&self) -> Result<Option<Duration>> {
        self.timeout_secs
            .map(|secs| Duration::try_from_secs_f64(secs).context("Invalid timeout"))
            .transpose()
    }

    pub fn termination_grace(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.termination_grace_secs)
            .context("Invalid termination grace period")
    }

    /// Validated invoker configuration for `executable`
    pub fn invocation_config(&self, executable: &str) -> Result<InvocationConfig> {
        let mut builder = InvocationConfig::builder(executable)
            .use_workspace(self.use_workspace)
            .remove_workspace_on_teardown(self.remove_workspace)
            .check_requirements(self.check_requirements)
            .launch_mode(self.launch_mode)
            .termination_grace(self.termination_grace()?);

        if let Some(path) = &self.workspace {
            builder = builder.workspace_path(path);
        }
        if let Some(timeout) = self.timeout()? {
            builder = builder.timeout(timeout);
        }
        for (key, value) in &self.env {
            builder = builder.env(key, value);
        }

        builder
            .build()
            .with_context(|| format!("Invalid invocation settings for '{}'", executable))
    }
}
