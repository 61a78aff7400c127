// Process Invoker - Invocation lifecycle
// Configured -> WorkspaceReady -> Running -> Completed, TornDown from anywhere

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::application::constants::{KILL_CONFIRM_TIMEOUT, TERMINATION_POLL_INTERVAL};
use crate::domain::{CommandLine, InvocationConfig, InvocationReport, InvokerState, RunState};
use crate::error::{InvokeError, Result};
use crate::port::{
    CapturedOutput, ChildProcess, Diagnostics, GenericTool, LaunchError, LaunchRequest,
    ProcessLauncher, RequirementChecker, ScratchWorkspace, TimeProvider, ToolIntegration,
};

/// Collaborators consumed by the invoker
#[derive(Clone)]
pub struct InvokerPorts {
    pub workspace: Arc<dyn ScratchWorkspace>,
    pub requirements: Arc<dyn RequirementChecker>,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub time_provider: Arc<dyn TimeProvider>,
}

enum WaitOutcome {
    Exited(CapturedOutput),
    TimedOut(CapturedOutput, Duration),
}

/// Drives one external executable through its lifecycle
///
/// The invoker exclusively owns its workspace and its child process.
/// Teardown runs at most once: explicitly through [`ProcessInvoker::teardown`],
/// or on drop, where failures are logged and suppressed.
///
/// # Example
/// ```ignore
/// let config = InvocationConfig::builder("ls").use_workspace(false).build()?;
/// let mut invoker = ProcessInvoker::new(config, ports);
/// invoker.invoke(["-1", "/tmp"]).await?;
/// println!("{} -> {:?}", invoker.stdout(), invoker.exit_status());
/// invoker.teardown()?;
/// ```
pub struct ProcessInvoker {
    config: InvocationConfig,
    ports: InvokerPorts,
    integration: Arc<dyn ToolIntegration>,
    state: InvokerState,
    run: RunState,
    process: Option<Box<dyn ChildProcess>>,
}

impl ProcessInvoker {
    pub fn new(config: InvocationConfig, ports: InvokerPorts) -> Self {
        Self {
            config,
            ports,
            integration: Arc::new(GenericTool),
            state: InvokerState::Configured,
            run: RunState::default(),
            process: None,
        }
    }

    /// Attach the tool integration supplying staging, cleanup and diagnostics
    pub fn with_integration(mut self, integration: Arc<dyn ToolIntegration>) -> Self {
        self.integration = integration;
        self
    }

    pub fn config(&self) -> &InvocationConfig {
        &self.config
    }

    pub fn state(&self) -> InvokerState {
        self.state
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    /// Directory used by the current run (None without a workspace, or once removed)
    pub fn workspace(&self) -> Option<&Path> {
        self.run.workspace()
    }

    pub fn command_line(&self) -> Option<&CommandLine> {
        self.run.command_line.as_ref()
    }

    /// Exit code of the last completed run
    pub fn exit_status(&self) -> Option<i32> {
        self.run.exit_status
    }

    pub fn stdout(&self) -> &str {
        &self.run.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.run.stderr
    }

    pub fn is_running(&self) -> bool {
        self.state == InvokerState::Running
    }

    /// Prepare the workspace (Configured -> WorkspaceReady)
    ///
    /// Without workspace use this only stages the integration. A supplied
    /// path is used as-is; otherwise a scratch directory is created once and
    /// kept for later runs. Calling it again while ready is a no-op.
    pub fn setup_workspace(&mut self) -> Result<Option<&Path>> {
        if self.state == InvokerState::WorkspaceReady {
            return Ok(self.run.workspace());
        }
        let mut next = self.state;
        next.transition(InvokerState::WorkspaceReady)?;

        if self.config.use_workspace() && self.run.workspace.is_none() {
            let workspace = match self.config.workspace_path() {
                Some(path) => path.to_path_buf(),
                None => {
                    let dir = self.ports.workspace.create_scratch_directory()?;
                    info!(workspace = %dir.display(), "Created scratch workspace");
                    dir
                }
            };
            self.run.workspace = Some(workspace);
        }

        self.integration.stage_workspace(self.run.workspace())?;
        self.state = next;
        Ok(self.run.workspace())
    }

    /// Verify the executable resolves and the workspace is reachable
    pub fn check_requirements(&self) -> Result<()> {
        let resolved = self
            .ports
            .requirements
            .check_executable_resolvable(self.config.executable())?;
        debug!(
            executable = %self.config.executable(),
            resolved = %resolved.display(),
            "Executable resolved"
        );

        if let Some(workspace) = self.run.workspace() {
            self.ports.requirements.check_directory_reachable(workspace)?;
        }
        Ok(())
    }

    /// Run the executable with the given argument tokens and wait for it
    ///
    /// Results are read afterwards through [`exit_status`](Self::exit_status),
    /// [`stdout`](Self::stdout) and [`stderr`](Self::stderr). A non-zero exit
    /// is not an error.
    ///
    /// # Errors
    /// - InvokeError::Workspace if the workspace cannot be prepared
    /// - InvokeError::Requirement if checking is enabled and a check fails
    /// - InvokeError::Launch if no process can be created at all
    /// - InvokeError::Timeout if the configured deadline expires
    pub async fn invoke<I, S>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command_line = CommandLine::new(self.config.executable(), args);
        self.run_command_line(command_line).await
    }

    /// Run the executable with one pre-joined argument string
    pub async fn invoke_line(&mut self, line: impl Into<String>) -> Result<()> {
        let command_line = CommandLine::from_line(self.config.executable(), line);
        self.run_command_line(command_line).await
    }

    async fn run_command_line(&mut self, command_line: CommandLine) -> Result<()> {
        if self.state != InvokerState::WorkspaceReady {
            self.setup_workspace()?;
        }
        if self.config.check_requirements() {
            self.check_requirements()?;
        }

        let request = LaunchRequest {
            command_line: command_line.clone(),
            mode: self.config.launch_mode(),
            working_dir: self.run.workspace.clone(),
            env: self.config.env().clone(),
        };

        info!(
            command = %command_line,
            workspace = ?self.run.workspace(),
            mode = %request.mode,
            "Launching process"
        );

        let child = self.ports.launcher.spawn(&request)?;
        self.state.transition(InvokerState::Running)?;
        self.run
            .begin(command_line, self.ports.time_provider.now_millis());
        self.run.pid = child.id();
        self.process = Some(child);

        let outcome = self.wait_for_exit().await?;
        let (output, timed_out) = match outcome {
            WaitOutcome::Exited(output) => (output, None),
            WaitOutcome::TimedOut(output, limit) => (output, Some(limit)),
        };

        // Confirmed exited: release the handle
        self.process = None;
        let now = self.ports.time_provider.now_millis();
        self.run
            .finish(output.exit_code, output.stdout, output.stderr, now);
        self.state.transition(InvokerState::Completed)?;

        info!(
            command = %self.run.command_line.as_ref().map(CommandLine::render).unwrap_or_default(),
            exit_code = output.exit_code,
            duration_ms = ?self.run.duration_ms(),
            "Process completed"
        );

        match timed_out {
            Some(limit) => Err(InvokeError::Timeout(duration_millis(limit))),
            None => Ok(()),
        }
    }

    async fn wait_for_exit(&mut self) -> Result<WaitOutcome> {
        let grace = self.config.termination_grace();
        let timeout = self.config.timeout();
        let process = self
            .process
            .as_mut()
            .ok_or_else(|| LaunchError::WaitFailed("no live process".to_string()))?;

        let Some(limit) = timeout else {
            return Ok(WaitOutcome::Exited(process.wait_with_output().await?));
        };

        let waited = tokio::time::timeout(limit, process.wait_with_output()).await;
        match waited {
            Ok(output) => Ok(WaitOutcome::Exited(output?)),
            Err(_) => {
                warn!(
                    pid = ?process.id(),
                    timeout_ms = duration_millis(limit),
                    "Process exceeded deadline, terminating"
                );
                let output = terminate_async(process.as_mut(), grace).await?;
                Ok(WaitOutcome::TimedOut(output, limit))
            }
        }
    }

    /// Harvest named output files through the tool integration
    ///
    /// # Errors
    /// - InvokeError::Unimplemented when the integration does not supply it
    pub fn extract_diagnostics(&self) -> Result<Diagnostics> {
        self.integration.extract_diagnostics(self.run.workspace())
    }

    /// Summary of the last completed run
    pub fn report(&self) -> Result<InvocationReport> {
        Ok(self.run.report()?)
    }

    /// Release the process and workspace (any state -> TornDown)
    ///
    /// A live process is asked to terminate and killed after the grace
    /// period. The workspace is then cleaned by the integration and, when
    /// configured, removed. Calling this again is a no-op.
    ///
    /// Stopping a live process blocks the calling thread for up to
    /// `termination_grace` plus [`KILL_CONFIRM_TIMEOUT`]. Async callers
    /// should prefer [`shutdown`](Self::shutdown); this form exists for `Drop`.
    pub fn teardown(&mut self) -> Result<()> {
        if !self.begin_teardown()? {
            return Ok(());
        }
        if let Some(mut process) = self.process.take() {
            let grace = self.config.termination_grace();
            if process.try_wait()?.is_none() {
                let pid = process.id();
                warn!(pid = ?pid, "Process still running at teardown, requesting termination");
                process.request_termination()?;
                let mut exited = wait_until_exited(process.as_mut(), grace)?;
                if exited.is_none() {
                    kill(process.as_mut())?;
                    exited = wait_until_exited(process.as_mut(), KILL_CONFIRM_TIMEOUT)?;
                }
                confirm_stopped(pid, exited)?;
            }
        }
        self.release_workspace()
    }

    /// Same as [`teardown`](Self::teardown) without blocking the runtime
    /// while a live process winds down
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.begin_teardown()? {
            return Ok(());
        }
        if let Some(mut process) = self.process.take() {
            let grace = self.config.termination_grace();
            if process.try_wait()?.is_none() {
                let pid = process.id();
                warn!(pid = ?pid, "Process still running at shutdown, requesting termination");
                process.request_termination()?;
                let mut exited = poll_until_exited(process.as_mut(), grace).await?;
                if exited.is_none() {
                    kill(process.as_mut())?;
                    exited = poll_until_exited(process.as_mut(), KILL_CONFIRM_TIMEOUT).await?;
                }
                confirm_stopped(pid, exited)?;
            }
        }
        self.release_workspace()
    }

    /// Move to TornDown; false when teardown already happened
    fn begin_teardown(&mut self) -> Result<bool> {
        if self.state == InvokerState::TornDown {
            debug!("Teardown already performed");
            return Ok(false);
        }
        self.state.transition(InvokerState::TornDown)?;
        Ok(true)
    }

    fn release_workspace(&mut self) -> Result<()> {
        self.integration.clean_workspace(self.run.workspace())?;

        if self.config.remove_workspace_on_teardown() {
            if let Some(workspace) = self.run.workspace.take() {
                self.ports.workspace.remove_recursive(&workspace)?;
                info!(workspace = %workspace.display(), "Removed workspace");
            }
        }
        Ok(())
    }
}

impl Drop for ProcessInvoker {
    fn drop(&mut self) {
        if self.state == InvokerState::TornDown {
            return;
        }
        if let Err(e) = self.teardown() {
            warn!(
                error = %e,
                executable = %self.config.executable(),
                "Teardown on disposal failed (suppressed)"
            );
        }
    }
}

/// Terminate, wait up to `grace`, then kill and collect whatever is left
///
/// Every wait here is bounded. Output pipes still open once the process is
/// gone (held by detached descendants) are abandoned after
/// [`KILL_CONFIRM_TIMEOUT`], keeping what was read.
async fn terminate_async(
    process: &mut dyn ChildProcess,
    grace: Duration,
) -> Result<CapturedOutput> {
    process.request_termination()?;
    if let Ok(output) = tokio::time::timeout(grace, process.wait_with_output()).await {
        return Ok(output?);
    }

    if process.try_wait()?.is_none() {
        kill(process)?;
    }
    match tokio::time::timeout(KILL_CONFIRM_TIMEOUT, process.wait_with_output()).await {
        Ok(output) => Ok(output?),
        Err(_) => {
            warn!(pid = ?process.id(), "Output still open after exit, keeping partial output");
            Ok(process.partial_output()?)
        }
    }
}

fn kill(process: &mut dyn ChildProcess) -> Result<()> {
    warn!(pid = ?process.id(), "Process ignored termination request, killing");
    Ok(process.kill()?)
}

fn confirm_stopped(pid: Option<u32>, exited: Option<i32>) -> Result<()> {
    match exited {
        Some(exit_code) => {
            info!(pid = ?pid, exit_code, "Process stopped");
            Ok(())
        }
        None => Err(LaunchError::SignalFailed(format!(
            "process {:?} still alive after kill",
            pid
        ))
        .into()),
    }
}

/// Poll until the process exits or `limit` passes, blocking the thread
fn wait_until_exited(process: &mut dyn ChildProcess, limit: Duration) -> Result<Option<i32>> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(exit_code) = process.try_wait()? {
            return Ok(Some(exit_code));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(TERMINATION_POLL_INTERVAL);
    }
}

/// Poll until the process exits or `limit` passes, yielding to the runtime
async fn poll_until_exited(process: &mut dyn ChildProcess, limit: Duration) -> Result<Option<i32>> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(exit_code) = process.try_wait()? {
            return Ok(Some(exit_code));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(TERMINATION_POLL_INTERVAL).await;
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
