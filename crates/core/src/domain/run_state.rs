// Invoker Lifecycle & Run State

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::command_line::CommandLine;
use crate::domain::error::{DomainError, Result};

/// Invoker lifecycle state
///
/// `Configured -> WorkspaceReady -> Running -> Completed`, with `TornDown`
/// reachable from every other state. `Completed -> WorkspaceReady` is an
/// explicit re-setup for a further run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvokerState {
    Configured,
    WorkspaceReady,
    Running,
    Completed,
    TornDown,
}

impl std::fmt::Display for InvokerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvokerState::Configured => write!(f, "CONFIGURED"),
            InvokerState::WorkspaceReady => write!(f, "WORKSPACE_READY"),
            InvokerState::Running => write!(f, "RUNNING"),
            InvokerState::Completed => write!(f, "COMPLETED"),
            InvokerState::TornDown => write!(f, "TORN_DOWN"),
        }
    }
}

impl InvokerState {
    pub fn can_transition_to(self, to: InvokerState) -> bool {
        use InvokerState::*;
        matches!(
            (self, to),
            (Configured, WorkspaceReady)
                | (Completed, WorkspaceReady)
                | (WorkspaceReady, Running)
                | (Running, Completed)
                | (Configured | WorkspaceReady | Running | Completed, TornDown)
        )
    }

    /// Move to `to`, rejecting transitions outside the lifecycle
    pub fn transition(&mut self, to: InvokerState) -> Result<()> {
        if !self.can_transition_to(to) {
            return Err(DomainError::InvalidStateTransition {
                from: self.to_string(),
                to: to.to_string(),
            });
        }
        *self = to;
        Ok(())
    }
}

/// Mutable state of the current invocation
///
/// Captured streams are always present once a run completes: a stream the
/// process never wrote to is an empty string, never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub workspace: Option<PathBuf>,
    pub command_line: Option<CommandLine>,
    pub pid: Option<u32>,
    pub exit_status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at: Option<i64>,  // epoch ms
    pub finished_at: Option<i64>, // epoch ms
}

impl RunState {
    /// Clear the outputs of a previous run, keeping the workspace
    pub fn begin(&mut self, command_line: CommandLine, now_millis: i64) {
        self.command_line = Some(command_line);
        self.pid = None;
        self.exit_status = None;
        self.stdout.clear();
        self.stderr.clear();
        self.started_at = Some(now_millis);
        self.finished_at = None;
    }

    pub fn finish(&mut self, exit_status: i32, stdout: String, stderr: String, now_millis: i64) {
        self.pid = None;
        self.exit_status = Some(exit_status);
        self.stdout = stdout;
        self.stderr = stderr;
        self.finished_at = Some(now_millis);
    }

    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).max(0)),
            _ => None,
        }
    }

    /// Summarise a completed run
    pub fn report(&self) -> Result<InvocationReport> {
        let (Some(command_line), Some(exit_status)) = (&self.command_line, self.exit_status)
        else {
            return Err(DomainError::NotCompleted);
        };

        Ok(InvocationReport {
            executable: command_line.program().to_string(),
            command_line: command_line.render(),
            workspace: self.workspace.clone(),
            exit_status,
            success: exit_status == 0,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration_ms: self.duration_ms(),
        })
    }
}

/// Serializable record of one completed invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationReport {
    pub executable: String,
    pub command_line: String,
    pub workspace: Option<PathBuf>,
    pub exit_status: i32,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub duration_ms: Option<i64>,
}
