//! Human and JSON rendering of invocation results

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

use relais_core::domain::InvocationReport;
use relais_core::port::Diagnostics;

const PREVIEW_CHARS: usize = 40;

#[derive(Tabled)]
struct DiagnosticRow {
    file: String,
    bytes: usize,
    preview: String,
}

impl DiagnosticRow {
    fn new(file: &str, contents: &str) -> Self {
        let first_line = contents.lines().next().unwrap_or_default();
        let mut preview: String = first_line.chars().take(PREVIEW_CHARS).collect();
        if first_line.chars().count() > PREVIEW_CHARS || contents.lines().nth(1).is_some() {
            preview.push('…');
        }
        Self {
            file: file.to_string(),
            bytes: contents.len(),
            preview,
        }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    #[serde(flatten)]
    report: &'a InvocationReport,
    timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a Diagnostics>,
}

/// Pass the child's streams through unchanged
pub fn relay_streams(report: &InvocationReport) {
    print!("{}", report.stdout);
    eprint!("{}", report.stderr);
}

pub fn status_line(report: &InvocationReport, timed_out: bool) -> String {
    let duration = report
        .duration_ms
        .map(|ms| format!(" in {} ms", ms))
        .unwrap_or_default();

    if timed_out {
        format!(
            "{} {} timed out (status {}){}",
            "✗".red(),
            report.command_line.bold(),
            report.exit_status,
            duration
        )
    } else if report.success {
        format!("{} {} exited with status 0{}", "✓".green(), report.command_line.bold(), duration)
    } else {
        format!(
            "{} {} exited with status {}{}",
            "✗".red(),
            report.command_line.bold(),
            report.exit_status.to_string().red(),
            duration
        )
    }
}

pub fn diagnostics_table(diagnostics: &Diagnostics) -> String {
    let rows: Vec<DiagnosticRow> = diagnostics
        .iter()
        .map(|(file, contents)| DiagnosticRow::new(file, contents))
        .collect();
    Table::new(rows).to_string()
}

/// Status and collected files go to stderr, leaving stdout to the child
pub fn print_human(report: &InvocationReport, timed_out: bool, diagnostics: Option<&Diagnostics>) {
    relay_streams(report);
    eprintln!("{}", status_line(report, timed_out));
    if let Some(diagnostics) = diagnostics {
        eprintln!();
        eprintln!("{}", "Collected files".cyan().bold());
        eprintln!("{}", diagnostics_table(diagnostics));
    }
}

pub fn render_json(
    report: &InvocationReport,
    timed_out: bool,
    diagnostics: Option<&Diagnostics>,
) -> Result<String> {
    let output = JsonOutput {
        report,
        timed_out,
        diagnostics,
    };
    Ok(serde_json::to_string_pretty(&output)?)
}
