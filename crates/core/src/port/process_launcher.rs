// Process Launcher Port
// Abstraction for "launch with working directory X, capture stdout/stderr,
// wait for exit, report exit code"

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{CommandLine, LaunchMode};

/// Everything a launcher needs to start one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub command_line: CommandLine,
    pub mode: LaunchMode,
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

/// Exit code and fully drained streams of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Launch errors (structural failures only; a non-zero exit is not an error)
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Working directory unavailable: {0}")]
    WorkingDirectory(PathBuf),

    #[error("Wait failed: {0}")]
    WaitFailed(String),

    #[error("Signal delivery failed: {0}")]
    SignalFailed(String),
}

/// Process launcher trait
///
/// Implementations:
/// - TokioProcessLauncher: real child processes via tokio::process
/// - MockProcessLauncher: scripted children for tests
pub trait ProcessLauncher: Send + Sync {
    /// Start a process. Returns once the process exists; does not wait.
    ///
    /// # Errors
    /// - LaunchError::SpawnFailed if the OS refuses to create a process
    /// - LaunchError::WorkingDirectory if the working directory is missing
    fn spawn(&self, request: &LaunchRequest) -> Result<Box<dyn ChildProcess>, LaunchError>;
}

/// Exclusive handle to one live (or finished) child process
#[async_trait]
pub trait ChildProcess: Send {
    /// OS process id, None once reaped or for a process that never started
    fn id(&self) -> Option<u32>;

    /// Wait for exit while draining stdout and stderr into memory
    ///
    /// Dropping the future leaves the process running; the handle stays
    /// usable for termination.
    async fn wait_with_output(&mut self) -> Result<CapturedOutput, LaunchError>;

    /// Exit code if the process has exited, without blocking
    fn try_wait(&mut self) -> Result<Option<i32>, LaunchError>;

    /// Output read so far from an exited process, giving up on its pipes
    ///
    /// Used when descendants outside the process group keep stdout or
    /// stderr open after the process itself is gone.
    ///
    /// # Errors
    /// - LaunchError::WaitFailed if the process has not exited yet
    fn partial_output(&mut self) -> Result<CapturedOutput, LaunchError>;

    /// Ask the process to stop (SIGTERM where available)
    fn request_termination(&mut self) -> Result<(), LaunchError>;

    /// Forcibly stop the process
    fn kill(&mut self) -> Result<(), LaunchError>;
}

/// A child that finished before it started, e.g. an executable that could
/// not be found. Reports a fixed outcome so launch failures stay data.
pub struct FinishedChild {
    output: CapturedOutput,
}

impl FinishedChild {
    pub fn new(output: CapturedOutput) -> Self {
        Self { output }
    }
}

#[async_trait]
impl ChildProcess for FinishedChild {
    fn id(&self) -> Option<u32> {
        None
    }

    async fn wait_with_output(&mut self) -> Result<CapturedOutput, LaunchError> {
        Ok(self.output.clone())
    }

    fn try_wait(&mut self) -> Result<Option<i32>, LaunchError> {
        Ok(Some(self.output.exit_code))
    }

    fn partial_output(&mut self) -> Result<CapturedOutput, LaunchError> {
        Ok(self.output.clone())
    }

    fn request_termination(&mut self) -> Result<(), LaunchError> {
        Ok(())
    }

    fn kill(&mut self) -> Result<(), LaunchError> {
        Ok(())
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Mock child behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit immediately with the given output
        Exit(CapturedOutput),
        /// Never exit on its own; stops once terminated or killed
        Hang,
        /// Ignore termination requests; stops only when killed
        IgnoreTerm,
        /// Stops once terminated, but its output never reaches EOF
        /// (a detached descendant holds the pipes). Carries the stdout
        /// written before that.
        HoldPipes(String),
        /// Refuse to spawn
        SpawnFail(String),
    }

    /// Signals observed by mock children
    #[derive(Debug, Default)]
    pub struct SignalLog {
        pub terminated: AtomicBool,
        pub killed: AtomicBool,
    }

    /// Mock process launcher that records every spawn request
    #[derive(Clone)]
    pub struct MockProcessLauncher {
        behavior: MockBehavior,
        requests: Arc<Mutex<Vec<LaunchRequest>>>,
        signals: Arc<SignalLog>,
        next_pid: Arc<AtomicU32>,
    }

    impl MockProcessLauncher {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                requests: Arc::new(Mutex::new(Vec::new())),
                signals: Arc::new(SignalLog::default()),
                next_pid: Arc::new(AtomicU32::new(4242)),
            }
        }

        pub fn new_exit(exit_code: i32, stdout: &str, stderr: &str) -> Self {
            Self::new(MockBehavior::Exit(CapturedOutput {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }))
        }

        pub fn new_success() -> Self {
            Self::new_exit(0, "mock output\n", "")
        }

        pub fn new_hang() -> Self {
            Self::new(MockBehavior::Hang)
        }

        pub fn spawn_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn requests(&self) -> Vec<LaunchRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn was_terminated(&self) -> bool {
            self.signals.terminated.load(Ordering::SeqCst)
        }

        pub fn was_killed(&self) -> bool {
            self.signals.killed.load(Ordering::SeqCst)
        }
    }

    impl ProcessLauncher for MockProcessLauncher {
        fn spawn(&self, request: &LaunchRequest) -> Result<Box<dyn ChildProcess>, LaunchError> {
            if let MockBehavior::SpawnFail(msg) = &self.behavior {
                return Err(LaunchError::SpawnFailed(msg.clone()));
            }
            self.requests.lock().unwrap().push(request.clone());
            Ok(Box::new(MockChild {
                behavior: self.behavior.clone(),
                signals: self.signals.clone(),
                pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            }))
        }
    }

    struct MockChild {
        behavior: MockBehavior,
        signals: Arc<SignalLog>,
        pid: u32,
    }

    impl MockChild {
        fn stopped(&self) -> Option<i32> {
            if self.signals.killed.load(Ordering::SeqCst) {
                return Some(137);
            }
            match self.behavior {
                MockBehavior::Hang | MockBehavior::HoldPipes(_)
                    if self.signals.terminated.load(Ordering::SeqCst) =>
                {
                    Some(143)
                }
                _ => None,
            }
        }
    }

    #[async_trait]
    impl ChildProcess for MockChild {
        fn id(&self) -> Option<u32> {
            Some(self.pid)
        }

        async fn wait_with_output(&mut self) -> Result<CapturedOutput, LaunchError> {
            match &self.behavior {
                MockBehavior::Exit(output) => return Ok(output.clone()),
                MockBehavior::HoldPipes(_) => std::future::pending::<()>().await,
                _ => {}
            }
            loop {
                if let Some(exit_code) = self.stopped() {
                    return Ok(CapturedOutput {
                        exit_code,
                        ..Default::default()
                    });
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        }

        fn try_wait(&mut self) -> Result<Option<i32>, LaunchError> {
            match &self.behavior {
                MockBehavior::Exit(output) => Ok(Some(output.exit_code)),
                _ => Ok(self.stopped()),
            }
        }

        fn partial_output(&mut self) -> Result<CapturedOutput, LaunchError> {
            let exit_code = self
                .try_wait()?
                .ok_or_else(|| LaunchError::WaitFailed("mock child still running".to_string()))?;
            let stdout = match &self.behavior {
                MockBehavior::Exit(output) => return Ok(output.clone()),
                MockBehavior::HoldPipes(stdout) => stdout.clone(),
                _ => String::new(),
            };
            Ok(CapturedOutput {
                exit_code,
                stdout,
                stderr: String::new(),
            })
        }

        fn request_termination(&mut self) -> Result<(), LaunchError> {
            self.signals.terminated.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn kill(&mut self) -> Result<(), LaunchError> {
            self.signals.killed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }
}
