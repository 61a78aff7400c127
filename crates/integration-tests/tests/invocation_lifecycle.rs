//! Invocation lifecycle against real processes and directories
//!
//! Setup, run, output capture, requirement checks, deadlines and teardown
//! through the production adapters.
#![cfg(unix)]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use relais_core::domain::{InvocationConfig, InvokerState, LaunchMode};
use relais_core::port::RequirementError;
use relais_core::{InvokeError, ProcessInvoker};
use relais_infra_system::{system_ports, system_ports_in};

fn populate(dir: &std::path::Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), b"").unwrap();
    }
}

/// Listing a populated workspace yields the sorted names on stdout
#[tokio::test]
async fn test_ls_in_workspace() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path(), &["foo", "bar", "baz", "dummy", "dummy2"]);
    let config = InvocationConfig::builder("ls")
        .workspace_path(dir.path())
        .env("LC_ALL", "C")
        .build()
        .unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports());

    invoker.invoke(Vec::<String>::new()).await.unwrap();

    assert_eq!(invoker.exit_status(), Some(0));
    assert_eq!(invoker.stdout(), "bar\nbaz\ndummy\ndummy2\nfoo\n");
    assert_eq!(invoker.stderr(), "");
    println!("✅ ls in workspace: {:?}", invoker.stdout());
}

/// A failing command is data: non-zero status with the error on stderr
#[tokio::test]
async fn test_ls_missing_directory() {
    let config = InvocationConfig::builder("ls")
        .use_workspace(false)
        .env("LC_ALL", "C")
        .build()
        .unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports());

    invoker.invoke(["nosuchdir"]).await.unwrap();

    assert_ne!(invoker.exit_status(), Some(0));
    assert!(invoker.exit_status().is_some());
    assert_eq!(invoker.stdout(), "");
    assert!(
        invoker.stderr().contains("No such file or directory"),
        "stderr was {:?}",
        invoker.stderr()
    );
}

/// Tokens are joined with single spaces; the shell then splits them again
#[tokio::test]
async fn test_echo_command_line() {
    let config = InvocationConfig::builder("echo")
        .use_workspace(false)
        .build()
        .unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports());

    invoker
        .invoke(["-a", "foo", "-b bar", "c=baz"])
        .await
        .unwrap();

    assert_eq!(
        invoker.command_line().unwrap().render(),
        "echo -a foo -b bar c=baz"
    );
    assert_eq!(invoker.stdout(), "-a foo -b bar c=baz\n");
}

/// Direct launch keeps each token as one argument
#[tokio::test]
async fn test_direct_launch_preserves_tokens() {
    let config = InvocationConfig::builder("printf")
        .use_workspace(false)
        .launch_mode(LaunchMode::Direct)
        .build()
        .unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports());

    invoker.invoke(["<%s>", "-b bar"]).await.unwrap();

    assert_eq!(invoker.stdout(), "<-b bar>");
}

/// Generated workspace exists during the run and is gone after teardown
#[tokio::test]
async fn test_generated_workspace_removed() {
    let root = tempfile::tempdir().unwrap();
    let config = InvocationConfig::builder("pwd")
        .remove_workspace_on_teardown(true)
        .build()
        .unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports_in(root.path()));

    invoker.invoke(Vec::<String>::new()).await.unwrap();
    let workspace = invoker.workspace().unwrap().to_path_buf();

    assert!(workspace.is_dir());
    assert!(workspace.starts_with(root.path()));
    assert_eq!(
        PathBuf::from(invoker.stdout().trim()).canonicalize().unwrap(),
        workspace.canonicalize().unwrap()
    );

    invoker.teardown().unwrap();
    assert!(!workspace.exists());
    invoker.teardown().unwrap();
    assert_eq!(invoker.state(), InvokerState::TornDown);
}

/// Without removal the workspace and its files survive teardown
#[tokio::test]
async fn test_generated_workspace_kept() {
    let root = tempfile::tempdir().unwrap();
    let config = InvocationConfig::builder("touch").build().unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports_in(root.path()));

    invoker.invoke(["made-here"]).await.unwrap();
    let workspace = invoker.workspace().unwrap().to_path_buf();
    invoker.teardown().unwrap();

    assert!(workspace.join("made-here").is_file());
}

/// Dropping the invoker releases the workspace like an explicit teardown
#[tokio::test]
async fn test_drop_removes_workspace() {
    let root = tempfile::tempdir().unwrap();
    let workspace = {
        let config = InvocationConfig::builder("true")
            .remove_workspace_on_teardown(true)
            .build()
            .unwrap();
        let mut invoker = ProcessInvoker::new(config, system_ports_in(root.path()));
        invoker.invoke(Vec::<String>::new()).await.unwrap();
        invoker.workspace().unwrap().to_path_buf()
    };

    assert!(!workspace.exists());
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

/// An unresolvable executable fails the requirement check; nothing runs
#[tokio::test]
async fn test_requirement_check_rejects_unknown_executable() {
    let config = InvocationConfig::builder("notaprogram-relais-xyz")
        .use_workspace(false)
        .check_requirements(true)
        .build()
        .unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports());

    let result = invoker.invoke(["-v"]).await;

    assert!(matches!(
        result,
        Err(InvokeError::Requirement(RequirementError::ExecutableNotFound(_)))
    ));
    assert!(invoker.exit_status().is_none());
    assert_eq!(invoker.state(), InvokerState::WorkspaceReady);
}

/// Without checks an unknown executable still runs (and fails as data)
#[tokio::test]
async fn test_unknown_executable_without_checks() {
    let config = InvocationConfig::builder("notaprogram-relais-xyz")
        .use_workspace(false)
        .build()
        .unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports());

    invoker.invoke(Vec::<String>::new()).await.unwrap();

    assert_eq!(invoker.exit_status(), Some(127));
    assert!(!invoker.stderr().is_empty());
}

/// Missing caller-supplied workspace is a launch error, not a silent mkdir
#[tokio::test]
async fn test_missing_supplied_workspace() {
    let root = tempfile::tempdir().unwrap();
    let missing = root.path().join("absent");
    let config = InvocationConfig::builder("ls")
        .workspace_path(&missing)
        .build()
        .unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports());

    let result = invoker.invoke(Vec::<String>::new()).await;

    assert!(matches!(result, Err(InvokeError::Launch(_))));
    assert!(!missing.exists());
}

/// A process past its deadline is terminated and reported as a timeout
#[tokio::test]
async fn test_timeout_terminates_process() {
    let config = InvocationConfig::builder("sleep")
        .use_workspace(false)
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports());
    let started = Instant::now();

    let result = invoker.invoke(["30"]).await;

    assert!(matches!(result, Err(InvokeError::Timeout(200))));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(invoker.exit_status(), Some(128 + 15));
    assert_eq!(invoker.state(), InvokerState::Completed);
}

/// A detached descendant holding stdout open cannot stretch the deadline
#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_timeout_bounded_with_detached_output_holder() {
    let config = InvocationConfig::builder("echo started; setsid sleep 10 & sleep 30; echo")
        .use_workspace(false)
        .timeout(Duration::from_millis(300))
        .termination_grace(Duration::from_millis(200))
        .build()
        .unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports());
    let started = Instant::now();

    let result = invoker.invoke(Vec::<String>::new()).await;

    assert!(matches!(result, Err(InvokeError::Timeout(300))));
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "invoke took {:?}",
        started.elapsed()
    );
    assert_eq!(invoker.exit_status(), Some(128 + 15));
    assert_eq!(invoker.stdout(), "started\n");
    assert_eq!(invoker.state(), InvokerState::Completed);
}

/// Async shutdown stops a run the caller stopped waiting for
#[tokio::test]
async fn test_shutdown_stops_abandoned_process() {
    let root = tempfile::tempdir().unwrap();
    let config = InvocationConfig::builder("sleep")
        .remove_workspace_on_teardown(true)
        .build()
        .unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports_in(root.path()));

    let abandoned = tokio::time::timeout(Duration::from_millis(200), invoker.invoke(["30"])).await;
    assert!(abandoned.is_err());
    assert!(invoker.is_running());

    invoker.shutdown().await.unwrap();

    assert_eq!(invoker.state(), InvokerState::TornDown);
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

/// The invoker can run again after completing, in the same workspace
#[tokio::test]
async fn test_repeat_runs_share_workspace() {
    let root = tempfile::tempdir().unwrap();
    let config = InvocationConfig::builder("touch").build().unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports_in(root.path()));

    invoker.invoke(["one"]).await.unwrap();
    invoker.invoke(["two"]).await.unwrap();
    let workspace = invoker.workspace().unwrap().to_path_buf();

    assert!(workspace.join("one").is_file());
    assert!(workspace.join("two").is_file());
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
}

/// Report of a completed run serializes to JSON
#[tokio::test]
async fn test_report_serializes() {
    let config = InvocationConfig::builder("echo")
        .use_workspace(false)
        .build()
        .unwrap();
    let mut invoker = ProcessInvoker::new(config, system_ports());
    invoker.invoke(["hello"]).await.unwrap();

    let report = invoker.report().unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["command_line"], "echo hello");
    assert_eq!(json["stdout"], "hello\n");
    assert_eq!(json["success"], true);
}
