use std::fs;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::Serialize;
use tracing::info;

use crate::batch::BatchRunner;
use crate::config::ResolvedConfig;
use crate::domain::{BatchOutcome, parse_url_list};
use crate::error::BatchError;
use crate::ledger::{Ledger, LedgerReport};
use crate::resolver::DestinationResolver;
use crate::task::TaskOptions;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }
}

/// Receives human-readable progress from concurrently running tasks.
pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub existing: usize,
    pub failed: usize,
    pub finished: bool,
    pub failures: Vec<FailureEntry>,
    pub ledger_errors: Vec<String>,
    pub started_at: String,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureEntry {
    pub url: String,
    pub error: String,
}

impl RunSummary {
    fn new(
        batch: &BatchOutcome,
        ledger: LedgerReport,
        started_at: String,
        elapsed: Duration,
    ) -> Self {
        Self {
            total: batch.total,
            succeeded: batch.succeeded.len(),
            existing: batch.existing.len(),
            failed: batch.failed.len(),
            finished: ledger.finished,
            failures: batch
                .failed
                .iter()
                .map(|record| FailureEntry {
                    url: record.url.clone(),
                    error: record.error.clone().unwrap_or_default(),
                })
                .collect(),
            ledger_errors: ledger.write_errors,
            started_at,
            elapsed_ms: elapsed.as_millis(),
        }
    }
}

/// Downloads a URL list into one output root and books the outcomes there.
pub struct App<T: Transport> {
    transport: T,
    resolver: DestinationResolver,
    ledger: Ledger,
    options: TaskOptions,
    concurrency: Option<NonZeroUsize>,
}

impl<T: Transport> App<T> {
    pub fn new(transport: T, config: &ResolvedConfig) -> Self {
        Self {
            transport,
            resolver: DestinationResolver::new(config.output_root.clone()),
            ledger: Ledger::new(config.output_root.clone()),
            options: TaskOptions {
                progress: config.progress,
            },
            concurrency: config.concurrency,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Reads the URL list first; an unreadable file aborts before any download.
    pub fn run_file(
        &self,
        urls_file: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, BatchError> {
        let content = fs::read_to_string(urls_file.as_std_path())
            .map_err(|_| BatchError::InputRead(urls_file.as_std_path().to_path_buf()))?;
        let urls = parse_url_list(&content);
        info!(file = %urls_file, count = urls.len(), "loaded url list");
        Ok(self.run_urls(&urls, sink))
    }

    pub fn run_urls(&self, urls: &[String], sink: &dyn ProgressSink) -> RunSummary {
        let started_at = chrono::Utc::now().to_rfc3339();
        let start = Instant::now();

        let batch = BatchRunner::new(&self.transport, &self.resolver, self.options)
            .with_concurrency(self.concurrency)
            .run(urls, sink);
        let report = self.ledger.record(urls, &batch);

        RunSummary::new(&batch, report, started_at, start.elapsed())
    }
}
