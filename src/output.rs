use std::io::{self, Write};

use crossterm::style::Stylize;
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RunSummary};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Colored one-line progress on stderr and a summary on stdout.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", "batchget summary".cyan())?;
        writeln!(
            stdout,
            "{}",
            format!("downloaded: {}", summary.succeeded).green()
        )?;
        writeln!(
            stdout,
            "{}",
            format!("already present: {}", summary.existing).yellow()
        )?;
        let failed = format!("failed: {}", summary.failed);
        if summary.failed > 0 {
            writeln!(stdout, "{}", failed.red())?;
        } else {
            writeln!(stdout, "{failed}")?;
        }
        for failure in &summary.failures {
            writeln!(stdout, "{}", format!("  {} ({})", failure.url, failure.error).red())?;
        }
        for error in &summary.ledger_errors {
            writeln!(stdout, "{}", format!("ledger: {error}").yellow())?;
        }
        if summary.finished {
            writeln!(stdout, "{}", "all urls done, waiting list cleared".green())?;
        }
        Ok(())
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        let line = match event.elapsed {
            Some(elapsed) => format!("{} [{} ms]", event.message, elapsed.as_millis()),
            None => event.message,
        };
        let styled = if line.starts_with("failed") {
            line.red()
        } else if line.starts_with("exists") {
            line.yellow()
        } else if line.starts_with("saved") {
            line.green()
        } else {
            line.dark_grey()
        };
        eprintln!("{styled}");
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
