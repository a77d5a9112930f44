use std::collections::HashMap;
use std::io;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use camino::Utf8PathBuf;
use tracing::{debug, error, warn};

use crate::app::ProgressSink;
use crate::domain::{BatchOutcome, OutcomeRecord};
use crate::error::BatchError;
use crate::resolver::DestinationResolver;
use crate::task::{DownloadTask, TaskOptions};
use crate::transport::Transport;

/// Fans a URL list out over worker threads and joins every outcome.
pub struct BatchRunner<'a, T: Transport + ?Sized> {
    transport: &'a T,
    resolver: &'a DestinationResolver,
    options: TaskOptions,
    concurrency: Option<NonZeroUsize>,
}

impl<'a, T: Transport + ?Sized> BatchRunner<'a, T> {
    pub fn new(transport: &'a T, resolver: &'a DestinationResolver, options: TaskOptions) -> Self {
        Self {
            transport,
            resolver,
            options,
            concurrency: None,
        }
    }

    /// Caps in-flight downloads. Without a cap every URL gets its own worker.
    pub fn with_concurrency(mut self, concurrency: Option<NonZeroUsize>) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Returns once every task has settled. Partitions keep settle order.
    pub fn run(&self, urls: &[String], sink: &dyn ProgressSink) -> BatchOutcome {
        let mut batch = BatchOutcome::new(urls.len());
        if urls.is_empty() {
            return batch;
        }
        warn_on_collisions(self.resolver, urls);

        let workers = match self.concurrency {
            Some(cap) => cap.get().min(urls.len()),
            None => urls.len(),
        };
        let cursor = AtomicUsize::new(0);
        let mut settled = vec![false; urls.len()];
        let (tx, rx) = mpsc::channel::<(usize, OutcomeRecord)>();

        let joined = thread::scope(|scope| {
            let handles = start_workers(workers, || {
                let tx = tx.clone();
                let cursor = &cursor;
                thread::Builder::new()
                    .name("batchget-worker".to_string())
                    .spawn_scoped(scope, move || {
                        let task = DownloadTask::new(self.transport, self.resolver, self.options);
                        loop {
                            let index = cursor.fetch_add(1, Ordering::Relaxed);
                            let Some(url) = urls.get(index) else {
                                break;
                            };
                            let record = run_guarded(&task, url, sink);
                            if tx.send((index, record)).is_err() {
                                break;
                            }
                        }
                    })
            });
            drop(tx);

            for (index, record) in rx.iter() {
                debug!(url = %record.url, outcome = %record.category, "task settled");
                settled[index] = true;
                batch.push(record);
            }

            handles
                .into_iter()
                .filter_map(|handle| handle.join().err())
                .count()
        });

        settle_missing(&mut batch, urls, &settled, joined);
        batch
    }
}

/// Spawns up to `workers` handles and stops at the first refusal. Workers
/// share one cursor, so the ones that did start drain every index.
fn start_workers<H>(workers: usize, mut spawn: impl FnMut() -> io::Result<H>) -> Vec<H> {
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        match spawn() {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                warn!(
                    started = handles.len(),
                    requested = workers,
                    error = %err,
                    "worker spawn refused, continuing with started workers"
                );
                break;
            }
        }
    }
    handles
}

/// Books a failure for every input index that never settled.
fn settle_missing(batch: &mut BatchOutcome, urls: &[String], settled: &[bool], aborted: usize) {
    if aborted == 0 && batch.settled() == urls.len() {
        return;
    }
    let err = BatchError::BatchAggregation(format!(
        "{} of {} tasks did not settle ({aborted} workers aborted)",
        urls.len() - batch.settled(),
        urls.len()
    ));
    error!(error = %err, "batch join incomplete");
    for (url, _) in urls.iter().zip(settled).filter(|(_, done)| !**done) {
        batch.push(OutcomeRecord::failure(url, None, &err));
    }
}

fn run_guarded<T: Transport + ?Sized>(
    task: &DownloadTask<'_, T>,
    url: &str,
    sink: &dyn ProgressSink,
) -> OutcomeRecord {
    match panic::catch_unwind(AssertUnwindSafe(|| task.run(url, sink))) {
        Ok(record) => record,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|value| value.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "task panicked".to_string());
            error!(url, panic = %message, "download task panicked");
            OutcomeRecord::failure(url, None, BatchError::BatchAggregation(message))
        }
    }
}

/// Destinations shared by more than one URL are written concurrently with no
/// ordering; this only reports them.
fn warn_on_collisions(resolver: &DestinationResolver, urls: &[String]) {
    let mut claims = HashMap::<Utf8PathBuf, Vec<&str>>::new();
    for url in urls {
        if let Ok(path) = resolver.resolve(url) {
            claims.entry(path).or_default().push(url.as_str());
        }
    }
    for (path, claimants) in claims {
        if claimants.len() > 1 {
            warn!(
                destination = %path,
                urls = ?claimants,
                "multiple urls share one destination"
            );
        }
    }
}
