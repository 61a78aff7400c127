//! Relais CLI - run an external program in a scratch workspace and report on it

mod logging;
mod output;
mod settings;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use relais_core::domain::LaunchMode;
use relais_core::port::RequirementChecker;
use relais_core::{InvokeError, ProcessInvoker};
use relais_infra_system::{system_ports, system_ports_in, FileHarvester, PathRequirementChecker};

use crate::settings::Settings;

/// Exit status when the deadline expired (same as coreutils `timeout`)
const EXIT_TIMED_OUT: u8 = 124;

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "relais")]
#[command(about = "Run external programs in disposable workspaces", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "RELAIS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an executable and wait for it
    Run(RunArgs),

    /// Print where an executable resolves on PATH
    Which {
        /// Executable name
        name: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Run in the current directory instead of a workspace
    #[arg(long, conflicts_with_all = ["workspace", "remove_workspace"])]
    no_workspace: bool,

    /// Use this existing directory as the workspace
    #[arg(long, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Delete the workspace afterwards
    #[arg(long)]
    remove_workspace: bool,

    /// Verify the executable and workspace before launching
    #[arg(long)]
    check: bool,

    /// Terminate the process after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,

    /// Pass arguments directly instead of through the shell
    #[arg(long)]
    direct: bool,

    /// Extra environment variable for the process (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Workspace file to collect after the run (repeatable)
    #[arg(long = "collect", value_name = "NAME")]
    collect: Vec<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Executable followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, value_name = "EXECUTABLE")]
    command: Vec<String>,
}

impl RunArgs {
    /// Flags take precedence over file and environment settings
    fn apply(&self, settings: &mut Settings) {
        if self.no_workspace {
            settings.use_workspace = false;
            settings.workspace = None;
            settings.remove_workspace = false;
        }
        if let Some(dir) = &self.workspace {
            settings.use_workspace = true;
            settings.workspace = Some(dir.clone());
        }
        if self.remove_workspace {
            settings.remove_workspace = true;
        }
        if self.check {
            settings.check_requirements = true;
        }
        if let Some(secs) = self.timeout {
            settings.timeout_secs = Some(secs);
        }
        if self.direct {
            settings.launch_mode = LaunchMode::Direct;
        }
        for (key, value) in &self.env {
            settings.env.insert(key.clone(), value.clone());
        }
    }
}

fn parse_env_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Child status as a process exit byte (out-of-range statuses become 1)
fn exit_byte(status: i32) -> u8 {
    u8::try_from(status).unwrap_or(1)
}

async fn run(args: RunArgs, mut settings: Settings) -> Result<ExitCode> {
    args.apply(&mut settings);

    let (executable, exe_args) = args
        .command
        .split_first()
        .context("Missing executable")?;
    let config = settings.invocation_config(executable)?;

    let ports = match &settings.scratch_root {
        Some(root) => system_ports_in(root),
        None => system_ports(),
    };
    let mut invoker = ProcessInvoker::new(config, ports);
    if !args.collect.is_empty() {
        invoker = invoker.with_integration(Arc::new(FileHarvester::new(args.collect.clone())));
    }

    let outcome = tokio::select! {
        result = invoker.invoke(exe_args.iter().cloned()) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(result) = outcome else {
        warn!(executable = %executable, "Interrupted, tearing down");
        invoker
            .shutdown()
            .await
            .context("Teardown after interrupt failed")?;
        eprintln!("{} interrupted", "✗".red());
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    };

    let timed_out = match result {
        Ok(()) => false,
        Err(InvokeError::Timeout(ms)) => {
            warn!(executable = %executable, timeout_ms = ms, "Deadline expired");
            true
        }
        Err(e) => {
            return Err(anyhow::Error::new(e).context(format!("Failed to run '{}'", executable)))
        }
    };

    let report = invoker.report()?;
    let diagnostics = if args.collect.is_empty() {
        None
    } else {
        Some(
            invoker
                .extract_diagnostics()
                .context("Failed to collect workspace files")?,
        )
    };
    invoker.shutdown().await.context("Teardown failed")?;

    if args.json {
        println!(
            "{}",
            output::render_json(&report, timed_out, diagnostics.as_ref())?
        );
    } else {
        output::print_human(&report, timed_out, diagnostics.as_ref());
    }

    if timed_out {
        return Ok(ExitCode::from(EXIT_TIMED_OUT));
    }
    Ok(ExitCode::from(exit_byte(report.exit_status)))
}

fn which(name: &str) -> ExitCode {
    match PathRequirementChecker::new().resolve_executable(name) {
        Some(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("{} '{}' not found on PATH", "✗".red(), name);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = logging::init_logging()?;

    match cli.command {
        Commands::Run(args) => {
            let settings = Settings::load(cli.config.as_deref())?;
            info!(version = relais_core::VERSION, "relais starting");
            run(args, settings).await
        }
        Commands::Which { name } => Ok(which(&name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Run(args) => args,
            Commands::Which { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_args_after_separator() {
        let args = parse(&["relais", "run", "--check", "--", "ls", "-l", "-a"]);

        assert!(args.check);
        assert_eq!(args.command, vec!["ls", "-l", "-a"]);
    }

    #[test]
    fn test_flags_override_settings() {
        let args = parse(&[
            "relais",
            "run",
            "--workspace",
            "/tmp/ws",
            "--direct",
            "--timeout",
            "1.5",
            "--env",
            "LC_ALL=C",
            "--",
            "ls",
        ]);
        let mut settings = Settings::default();

        args.apply(&mut settings);

        assert_eq!(settings.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(settings.launch_mode, LaunchMode::Direct);
        assert_eq!(settings.timeout_secs, Some(1.5));
        assert_eq!(settings.env.get("LC_ALL").map(String::as_str), Some("C"));
    }

    #[test]
    fn test_no_workspace_clears_file_settings() {
        let args = parse(&["relais", "run", "--no-workspace", "--", "ls"]);
        let mut settings = Settings {
            workspace: Some(PathBuf::from("/srv/ws")),
            remove_workspace: true,
            ..Settings::default()
        };

        args.apply(&mut settings);

        assert!(settings.invocation_config("ls").is_ok());
        assert!(!settings.use_workspace);
    }

    #[test]
    fn test_conflicting_flags_rejected() {
        assert!(Cli::try_parse_from(["relais", "run", "--no-workspace", "--workspace", "/x", "--", "ls"]).is_err());
        assert!(Cli::try_parse_from(["relais", "run"]).is_err());
    }

    #[test]
    fn test_parse_env_pair() {
        assert_eq!(
            parse_env_pair("A=b=c"),
            Ok(("A".to_string(), "b=c".to_string()))
        );
        assert!(parse_env_pair("novalue").is_err());
        assert!(parse_env_pair("=x").is_err());
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_byte(0), 0);
        assert_eq!(exit_byte(2), 2);
        assert_eq!(exit_byte(-1), 1);
    }
}
