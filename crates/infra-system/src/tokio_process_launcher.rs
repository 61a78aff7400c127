// Process launcher on tokio::process
// reason: async wait lets the invoker enforce deadlines without extra threads
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info};

use relais_core::domain::LaunchMode;
use relais_core::port::{
    CapturedOutput, ChildProcess, FinishedChild, LaunchError, LaunchRequest, ProcessLauncher,
};

/// Exit status reported when a directly launched program does not exist
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit status reported when a directly launched program cannot be executed
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Launches real child processes
///
/// Every child gets its own process group (unix), so termination reaches
/// grandchildren started by the shell as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessLauncher;

impl TokioProcessLauncher {
    pub fn new() -> Self {
        Self
    }

    fn build_command(request: &LaunchRequest) -> Command {
        let mut command = match request.mode {
            LaunchMode::Shell => shell_command(&request.command_line.render()),
            LaunchMode::Direct => {
                let mut command = Command::new(request.command_line.program());
                command.args(request.command_line.args());
                command
            }
        };

        command
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &request.working_dir {
            command.current_dir(dir);
        }

        #[cfg(unix)]
        command.process_group(0);

        command
    }
}

#[cfg(unix)]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(line);
    command
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(line);
    command
}

/// Turn a failed direct spawn into a finished run, the way a shell reports it
fn launch_failure(program: &str, error: &std::io::Error) -> Option<CapturedOutput> {
    let exit_code = match error.kind() {
        ErrorKind::NotFound => EXIT_NOT_FOUND,
        ErrorKind::PermissionDenied => EXIT_NOT_EXECUTABLE,
        _ => return None,
    };
    Some(CapturedOutput {
        exit_code,
        stdout: String::new(),
        stderr: format!("{}: {}\n", program, error),
    })
}

impl ProcessLauncher for TokioProcessLauncher {
    fn spawn(&self, request: &LaunchRequest) -> Result<Box<dyn ChildProcess>, LaunchError> {
        if let Some(dir) = &request.working_dir {
            if !dir.is_dir() {
                return Err(LaunchError::WorkingDirectory(dir.clone()));
            }
        }

        let mut command = Self::build_command(request);
        match command.spawn() {
            Ok(child) => {
                debug!(
                    pid = ?child.id(),
                    command = %request.command_line,
                    mode = %request.mode,
                    "Child process spawned"
                );
                Ok(Box::new(TokioChild::new(child)))
            }
            Err(e) => {
                let program = request.command_line.program();
                match launch_failure(program, &e) {
                    Some(output) if request.mode == LaunchMode::Direct => {
                        info!(
                            program = %program,
                            exit_code = output.exit_code,
                            error = %e,
                            "Program could not be started"
                        );
                        Ok(Box::new(FinishedChild::new(output)))
                    }
                    _ => Err(LaunchError::SpawnFailed(e.to_string())),
                }
            }
        }
    }
}

/// Live child with its output pipes
///
/// Output read so far stays buffered here, so an interrupted wait can be
/// resumed after termination without losing what the process wrote.
pub struct TokioChild {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    stdout_buf: Vec<u8>,
    stderr_buf: Vec<u8>,
}

impl TokioChild {
    fn new(mut child: Child) -> Self {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        Self {
            child,
            stdout,
            stderr,
            stdout_buf: Vec::new(),
            stderr_buf: Vec::new(),
        }
    }

    fn take_output(&mut self, status: ExitStatus) -> CapturedOutput {
        CapturedOutput {
            exit_code: exit_code(status),
            stdout: String::from_utf8_lossy(&std::mem::take(&mut self.stdout_buf)).into_owned(),
            stderr: String::from_utf8_lossy(&std::mem::take(&mut self.stderr_buf)).into_owned(),
        }
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: nix::sys::signal::Signal) -> Result<(), LaunchError> {
        use nix::errno::Errno;
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        // Already reaped
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        match killpg(Pid::from_raw(pid as i32), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(LaunchError::SignalFailed(format!("{:?} to {}: {}", signal, pid, e))),
        }
    }

    #[cfg(not(unix))]
    fn force_kill(&mut self) -> Result<(), LaunchError> {
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(LaunchError::SignalFailed(e.to_string())),
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<&mut R>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    if let Some(pipe) = pipe {
        pipe.read_to_end(buf).await?;
    }
    Ok(())
}

/// Exit code, or 128 + signal number for a signal-terminated process
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[async_trait]
impl ChildProcess for TokioChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait_with_output(&mut self) -> Result<CapturedOutput, LaunchError> {
        // Drain both pipes while waiting so a full pipe never blocks the child
        let (status, _, _) = tokio::try_join!(
            self.child.wait(),
            drain(self.stdout.as_mut(), &mut self.stdout_buf),
            drain(self.stderr.as_mut(), &mut self.stderr_buf),
        )
        .map_err(|e| LaunchError::WaitFailed(e.to_string()))?;

        Ok(self.take_output(status))
    }

    fn try_wait(&mut self) -> Result<Option<i32>, LaunchError> {
        self.child
            .try_wait()
            .map(|status| status.map(exit_code))
            .map_err(|e| LaunchError::WaitFailed(e.to_string()))
    }

    fn partial_output(&mut self) -> Result<CapturedOutput, LaunchError> {
        let status = self
            .child
            .try_wait()
            .map_err(|e| LaunchError::WaitFailed(e.to_string()))?
            .ok_or_else(|| LaunchError::WaitFailed("process still running".to_string()))?;

        // Pipes held by detached descendants are abandoned
        self.stdout = None;
        self.stderr = None;
        debug!(
            stdout_bytes = self.stdout_buf.len(),
            stderr_bytes = self.stderr_buf.len(),
            "Keeping partial output"
        );
        Ok(self.take_output(status))
    }

    fn request_termination(&mut self) -> Result<(), LaunchError> {
        #[cfg(unix)]
        {
            debug!(pid = ?self.child.id(), "Sending SIGTERM to process group");
            self.signal_group(nix::sys::signal::Signal::SIGTERM)
        }

        #[cfg(not(unix))]
        {
            self.force_kill()
        }
    }

    fn kill(&mut self) -> Result<(), LaunchError> {
        #[cfg(unix)]
        {
            debug!(pid = ?self.child.id(), "Sending SIGKILL to process group");
            self.signal_group(nix::sys::signal::Signal::SIGKILL)
        }

        #[cfg(not(unix))]
        {
            self.force_kill()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use relais_core::domain::CommandLine;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn request(command_line: CommandLine, mode: LaunchMode) -> LaunchRequest {
        LaunchRequest {
            command_line,
            mode,
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    async fn run(request: LaunchRequest) -> CapturedOutput {
        let mut child = TokioProcessLauncher::new().spawn(&request).unwrap();
        child.wait_with_output().await.unwrap()
    }

    #[tokio::test]
    async fn test_shell_mode_splits_tokens() {
        let line = CommandLine::new("echo", ["-a", "foo", "-b bar", "c=baz"]);

        let output = run(request(line, LaunchMode::Shell)).await;

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout, "-a foo -b bar c=baz\n");
        assert_eq!(output.stderr, "");
    }

    #[tokio::test]
    async fn test_direct_mode_keeps_tokens() {
        let line = CommandLine::new("printf", ["[%s]\\n", "-b bar", "c=baz"]);

        let output = run(request(line, LaunchMode::Direct)).await;

        assert_eq!(output.stdout, "[-b bar]\n[c=baz]\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_and_stderr() {
        let line = CommandLine::new("ls", ["nosuchdir-relais"]);

        let output = run(request(line, LaunchMode::Shell)).await;

        assert_ne!(output.exit_code, 0);
        assert_eq!(output.stdout, "");
        assert!(output.stderr.contains("nosuchdir-relais"));
    }

    #[tokio::test]
    async fn test_direct_missing_program_is_data() {
        let line = CommandLine::new("notaprogram-relais-xyz", ["-v"]);

        let output = run(request(line, LaunchMode::Direct)).await;

        assert_eq!(output.exit_code, EXIT_NOT_FOUND);
        assert!(output.stderr.starts_with("notaprogram-relais-xyz: "));
    }

    #[tokio::test]
    async fn test_shell_missing_program_exit_127() {
        let line = CommandLine::new("notaprogram-relais-xyz", Vec::<String>::new());

        let output = run(request(line, LaunchMode::Shell)).await;

        assert_eq!(output.exit_code, EXIT_NOT_FOUND);
        assert!(!output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_missing_working_directory_rejected() {
        let mut req = request(CommandLine::new("pwd", Vec::<String>::new()), LaunchMode::Shell);
        req.working_dir = Some(PathBuf::from("/nonexistent/relais/dir"));

        let result = TokioProcessLauncher::new().spawn(&req);

        assert!(matches!(result, Err(LaunchError::WorkingDirectory(_))));
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(CommandLine::new("pwd", Vec::<String>::new()), LaunchMode::Shell);
        req.working_dir = Some(dir.path().to_path_buf());

        let output = run(req).await;

        let reported = PathBuf::from(output.stdout.trim()).canonicalize().unwrap();
        assert_eq!(reported, dir.path().canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_env_overrides_applied() {
        let mut req = request(
            CommandLine::new("echo", ["$RELAIS_TEST_VALUE"]),
            LaunchMode::Shell,
        );
        req.env
            .insert("RELAIS_TEST_VALUE".to_string(), "hello".to_string());

        let output = run(req).await;

        assert_eq!(output.stdout, "hello\n");
    }

    #[tokio::test]
    async fn test_large_output_does_not_block() {
        let line = CommandLine::new("yes", ["| head -n 100000"]);

        let output = run(request(line, LaunchMode::Shell)).await;

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.len(), 200_000);
    }

    #[tokio::test]
    async fn test_termination_request_stops_process() {
        let line = CommandLine::new("sleep", ["30"]);
        let mut child = TokioProcessLauncher::new()
            .spawn(&request(line, LaunchMode::Shell))
            .unwrap();
        assert!(child.id().is_some());
        assert_eq!(child.try_wait().unwrap(), None);

        child.request_termination().unwrap();
        let output = tokio::time::timeout(Duration::from_secs(5), child.wait_with_output())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(output.exit_code, 128 + 15);
    }

    #[tokio::test]
    async fn test_kill_stops_process_ignoring_term() {
        let line = CommandLine::new("trap '' TERM; while true; do sleep 0.05; done", Vec::<String>::new());
        let mut child = TokioProcessLauncher::new()
            .spawn(&request(line, LaunchMode::Shell))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        child.request_termination().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(child.try_wait().unwrap(), None);

        child.kill().unwrap();
        let output = tokio::time::timeout(Duration::from_secs(5), child.wait_with_output())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(output.exit_code, 128 + 9);
        // Signalling a reaped process is harmless
        assert!(child.kill().is_ok());
    }

    #[tokio::test]
    async fn test_interrupted_wait_keeps_partial_output() {
        let line = CommandLine::new("echo started; sleep 30", Vec::<String>::new());
        let mut child = TokioProcessLauncher::new()
            .spawn(&request(line, LaunchMode::Shell))
            .unwrap();

        let first = tokio::time::timeout(Duration::from_millis(300), child.wait_with_output()).await;
        assert!(first.is_err());

        child.request_termination().unwrap();
        let output = child.wait_with_output().await.unwrap();

        assert_eq!(output.stdout, "started\n");
        assert_eq!(output.exit_code, 128 + 15);
    }

    #[tokio::test]
    async fn test_partial_output_requires_exit() {
        let line = CommandLine::new("sleep", ["30"]);
        let mut child = TokioProcessLauncher::new()
            .spawn(&request(line, LaunchMode::Shell))
            .unwrap();

        assert!(matches!(
            child.partial_output(),
            Err(LaunchError::WaitFailed(_))
        ));
        child.kill().unwrap();
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_partial_output_with_pipe_held_by_detached_process() {
        // setsid puts the sleeper outside the group, still holding stdout
        let line = CommandLine::new("echo started; setsid sleep 5 &", Vec::<String>::new());
        let mut child = TokioProcessLauncher::new()
            .spawn(&request(line, LaunchMode::Shell))
            .unwrap();

        let waited = tokio::time::timeout(Duration::from_millis(500), child.wait_with_output()).await;
        assert!(waited.is_err());

        let output = child.partial_output().unwrap();
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout, "started\n");
    }
}
