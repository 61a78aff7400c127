// Invocation Configuration
// Set once at construction, validated by the builder

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::application::constants::DEFAULT_TERMINATION_GRACE;
use crate::domain::error::ConfigError;

/// How the assembled command line reaches the operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// Run the rendered command line through the platform shell (`sh -c`, `cmd /C`).
    /// A token such as `"-b bar"` is split by the shell into two arguments.
    #[default]
    Shell,
    /// Spawn the executable directly with every token as one argv element.
    Direct,
}

impl std::fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchMode::Shell => write!(f, "shell"),
            LaunchMode::Direct => write!(f, "direct"),
        }
    }
}

impl std::str::FromStr for LaunchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shell" => Ok(LaunchMode::Shell),
            "direct" => Ok(LaunchMode::Direct),
            other => Err(format!("unknown launch mode '{}'", other)),
        }
    }
}

/// Immutable configuration of one process invoker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationConfig {
    executable: String,
    use_workspace: bool,
    workspace_path: Option<PathBuf>,
    remove_workspace_on_teardown: bool,
    check_requirements: bool,
    launch_mode: LaunchMode,
    timeout: Option<Duration>,
    termination_grace: Duration,
    env: BTreeMap<String, String>,
}

impl InvocationConfig {
    /// Start building a configuration for `executable`
    ///
    /// Defaults: workspace used and auto-generated, kept after teardown,
    /// no requirement checks, shell launch, no deadline.
    ///
    /// # Example
    /// ```
    /// use relais_core::domain::InvocationConfig;
    ///
    /// let config = InvocationConfig::builder("ls")
    ///     .use_workspace(false)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.executable(), "ls");
    /// ```
    pub fn builder(executable: impl Into<String>) -> InvocationConfigBuilder {
        InvocationConfigBuilder::new(executable)
    }

    /// Check the constructor invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executable.trim().is_empty() {
            return Err(ConfigError::EmptyExecutable);
        }
        if !self.use_workspace {
            if let Some(path) = &self.workspace_path {
                return Err(ConfigError::WorkspacePathWithoutWorkspace(
                    path.display().to_string(),
                ));
            }
            if self.remove_workspace_on_teardown {
                return Err(ConfigError::RemovalWithoutWorkspace);
            }
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn use_workspace(&self) -> bool {
        self.use_workspace
    }

    pub fn workspace_path(&self) -> Option<&Path> {
        self.workspace_path.as_deref()
    }

    pub fn remove_workspace_on_teardown(&self) -> bool {
        self.remove_workspace_on_teardown
    }

    pub fn check_requirements(&self) -> bool {
        self.check_requirements
    }

    pub fn launch_mode(&self) -> LaunchMode {
        self.launch_mode
    }

    /// Deadline for one invocation (None = wait forever)
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// How long a terminated process gets to exit before it is killed
    pub fn termination_grace(&self) -> Duration {
        self.termination_grace
    }

    /// Extra environment variables for the child
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

/// Builder for [`InvocationConfig`]
#[derive(Debug, Clone)]
pub struct InvocationConfigBuilder {
    config: InvocationConfig,
}

impl InvocationConfigBuilder {
    fn new(executable: impl Into<String>) -> Self {
        Self {
            config: InvocationConfig {
                executable: executable.into(),
                use_workspace: true,
                workspace_path: None,
                remove_workspace_on_teardown: false,
                check_requirements: false,
                launch_mode: LaunchMode::default(),
                timeout: None,
                termination_grace: DEFAULT_TERMINATION_GRACE,
                env: BTreeMap::new(),
            },
        }
    }

    pub fn use_workspace(mut self, use_workspace: bool) -> Self {
        self.config.use_workspace = use_workspace;
        self
    }

    /// Run in a caller-supplied directory instead of a generated one.
    /// An empty path means "generate one".
    pub fn workspace_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.config.workspace_path = if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        };
        self
    }

    pub fn remove_workspace_on_teardown(mut self, remove: bool) -> Self {
        self.config.remove_workspace_on_teardown = remove;
        self
    }

    pub fn check_requirements(mut self, check: bool) -> Self {
        self.config.check_requirements = check;
        self
    }

    pub fn launch_mode(mut self, mode: LaunchMode) -> Self {
        self.config.launch_mode = mode;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn termination_grace(mut self, grace: Duration) -> Self {
        self.config.termination_grace = grace;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<InvocationConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
