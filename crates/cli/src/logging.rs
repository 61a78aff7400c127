//! Tracing subscriber setup
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives (default: relais=info)
//! - `RELAIS_LOG_FORMAT`: `pretty` (default) or `json`
//! - `RELAIS_LOG_DIR`: also write JSON logs to a daily rolling file there

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "relais=info";
const LOG_FILE_PREFIX: &str = "relais.log";

/// Install the global subscriber. Logs go to stderr so relayed child
/// output on stdout stays clean.
///
/// The returned guard flushes the file writer and must live until exit.
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    let log_format = std::env::var("RELAIS_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("Failed to create env filter")?;

    let (file_layer, guard) = match std::env::var_os("RELAIS_LOG_DIR") {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    match log_format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
