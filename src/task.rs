use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::time::Instant;

use camino::Utf8Path;
use tracing::{debug, info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::OutcomeRecord;
use crate::error::BatchError;
use crate::guard::{Readiness, ensure_writable};
use crate::resolver::DestinationResolver;
use crate::transport::Transport;

const CHUNK_SIZE: usize = 64 * 1024;
const UNKNOWN_LENGTH_TICK: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct TaskOptions {
    /// Report bytes received against the declared content length.
    pub progress: bool,
}

/// Downloads one URL into its resolved destination.
pub struct DownloadTask<'a, T: Transport + ?Sized> {
    transport: &'a T,
    resolver: &'a DestinationResolver,
    options: TaskOptions,
}

impl<'a, T: Transport + ?Sized> DownloadTask<'a, T> {
    pub fn new(transport: &'a T, resolver: &'a DestinationResolver, options: TaskOptions) -> Self {
        Self {
            transport,
            resolver,
            options,
        }
    }

    /// Never fails: every error is folded into a `failure` record.
    pub fn run(&self, url: &str, sink: &dyn ProgressSink) -> OutcomeRecord {
        let destination = match self.resolver.resolve(url) {
            Ok(path) => path,
            Err(err) => {
                warn!(url, error = %err, "skipping unresolvable url");
                sink.event(ProgressEvent::new(format!("failed {url}: {err}")));
                return OutcomeRecord::failure(url, None, err);
            }
        };

        info!(url, destination = %destination, "download starting");
        sink.event(ProgressEvent::new(format!("downloading {url}")));
        let start = Instant::now();

        match ensure_writable(&destination) {
            Ok(Readiness::AlreadyExists) => {
                info!(url, destination = %destination, "destination exists, skipping");
                sink.event(ProgressEvent::new(format!("exists {destination}")));
                OutcomeRecord::exists(url, destination)
            }
            Ok(Readiness::Ready) => match self.fetch_to(url, &destination, sink) {
                Ok(bytes) => {
                    info!(url, bytes, "download finished");
                    sink.event(ProgressEvent {
                        message: format!("saved {destination} ({bytes} bytes)"),
                        elapsed: Some(start.elapsed()),
                    });
                    OutcomeRecord::success(url, destination)
                }
                Err(err) => {
                    warn!(url, error = %err, "download failed");
                    remove_partial(&destination);
                    sink.event(ProgressEvent {
                        message: format!("failed {url}: {err}"),
                        elapsed: Some(start.elapsed()),
                    });
                    OutcomeRecord::failure(url, Some(destination), err)
                }
            },
            Err(err) => {
                warn!(url, error = %err, "destination not writable");
                sink.event(ProgressEvent::new(format!("failed {url}: {err}")));
                OutcomeRecord::failure(url, Some(destination), err)
            }
        }
    }

    fn fetch_to(
        &self,
        url: &str,
        destination: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<u64, BatchError> {
        let file = File::create(destination.as_std_path())
            .map_err(|err| BatchError::Filesystem(format!("create {destination}: {err}")))?;
        let mut writer = BufWriter::new(file);

        let mut response = self.transport.fetch(url)?;
        let mut progress = self
            .options
            .progress
            .then(|| ProgressTracker::new(url, response.content_length));

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut received = 0u64;
        loop {
            let read = match response.body.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(BatchError::Transport(format!("{url}: {err}"))),
            };
            writer
                .write_all(&buf[..read])
                .map_err(|err| BatchError::Filesystem(format!("write {destination}: {err}")))?;
            received += read as u64;
            if let Some(tracker) = progress.as_mut() {
                tracker.advance(received, sink);
            }
        }
        writer
            .flush()
            .map_err(|err| BatchError::Filesystem(format!("write {destination}: {err}")))?;
        Ok(received)
    }
}

/// Best-effort removal of a partially written destination.
fn remove_partial(destination: &Utf8Path) {
    if !destination.as_std_path().exists() {
        return;
    }
    if let Err(err) = fs::remove_file(destination.as_std_path()) {
        warn!(destination = %destination, error = %err, "failed to remove partial download");
    }
}

struct ProgressTracker {
    url: String,
    total: Option<u64>,
    next_mark: u64,
}

impl ProgressTracker {
    fn new(url: &str, total: Option<u64>) -> Self {
        let mut tracker = Self {
            url: url.to_string(),
            total: total.filter(|total| *total > 0),
            next_mark: 0,
        };
        tracker.next_mark = tracker.step();
        tracker
    }

    fn step(&self) -> u64 {
        match self.total {
            Some(total) => (total / 10).max(1),
            None => UNKNOWN_LENGTH_TICK,
        }
    }

    fn advance(&mut self, received: u64, sink: &dyn ProgressSink) {
        if received < self.next_mark {
            return;
        }
        let message = match self.total {
            Some(total) => {
                let percent = received.saturating_mul(100) / total;
                format!("{} {percent}% ({received}/{total} bytes)", self.url)
            }
            None => format!("{} {received} bytes", self.url),
        };
        debug!(url = %self.url, received, total = ?self.total, "progress");
        sink.event(ProgressEvent::new(message));
        let step = self.step();
        while self.next_mark <= received {
            self.next_mark += step;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};
    use std::sync::Mutex;

    use camino::Utf8PathBuf;

    use super::*;
    use crate::domain::OutcomeCategory;
    use crate::output::JsonOutput;
    use crate::transport::FetchResponse;

    /// Yields `data` and then fails, like a connection dropped mid-body.
    struct BrokenBody {
        data: Cursor<Vec<u8>>,
    }

    impl Read for BrokenBody {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let read = self.data.read(buf)?;
            if read == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            Ok(read)
        }
    }

    #[derive(Default)]
    struct MockTransport {
        calls: Mutex<usize>,
        broken: bool,
        /// Replaced by a directory during the fetch, so cleanup cannot delete it.
        pin: Option<Utf8PathBuf>,
    }

    impl Transport for MockTransport {
        fn fetch(&self, _url: &str) -> Result<FetchResponse, BatchError> {
            *self.calls.lock().unwrap() += 1;
            if let Some(path) = &self.pin {
                fs::remove_file(path.as_std_path()).unwrap();
                fs::create_dir(path.as_std_path()).unwrap();
            }
            let data = b"partial-body".to_vec();
            let body: Box<dyn Read + Send> = if self.broken {
                Box::new(BrokenBody {
                    data: Cursor::new(data),
                })
            } else {
                Box::new(Cursor::new(data))
            };
            Ok(FetchResponse {
                status: 200,
                content_length: Some(12),
                body,
            })
        }
    }

    fn temp_resolver() -> (tempfile::TempDir, DestinationResolver) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, DestinationResolver::new(root))
    }

    #[test]
    fn streams_body_to_destination() {
        let (_temp, resolver) = temp_resolver();
        let transport = MockTransport::default();
        let task = DownloadTask::new(&transport, &resolver, TaskOptions { progress: true });

        let record = task.run("http://a.example/dir/y.txt", &JsonOutput);

        assert_eq!(record.category, OutcomeCategory::Success);
        let saved = fs::read(resolver.root().join("dir/y.txt").as_std_path()).unwrap();
        assert_eq!(saved, b"partial-body");
    }

    #[test]
    fn existing_destination_skips_fetch() {
        let (_temp, resolver) = temp_resolver();
        fs::write(resolver.root().join("x.txt").as_std_path(), b"old").unwrap();
        let transport = MockTransport::default();
        let task = DownloadTask::new(&transport, &resolver, TaskOptions::default());

        let record = task.run("http://a.example/x.txt", &JsonOutput);

        assert_eq!(record.category, OutcomeCategory::Exists);
        assert_eq!(*transport.calls.lock().unwrap(), 0);
    }

    #[test]
    fn broken_stream_removes_partial_file() {
        let (_temp, resolver) = temp_resolver();
        let transport = MockTransport {
            broken: true,
            ..MockTransport::default()
        };
        let task = DownloadTask::new(&transport, &resolver, TaskOptions::default());

        let record = task.run("http://a.example/z.txt", &JsonOutput);

        assert_eq!(record.category, OutcomeCategory::Failure);
        assert!(record.error.unwrap().contains("reset"));
        assert!(!resolver.root().join("z.txt").as_std_path().exists());
    }

    #[test]
    fn undeletable_partial_keeps_original_failure() {
        let (_temp, resolver) = temp_resolver();
        let destination = resolver.root().join("z.txt");
        let transport = MockTransport {
            broken: true,
            pin: Some(destination.clone()),
            ..MockTransport::default()
        };
        let task = DownloadTask::new(&transport, &resolver, TaskOptions::default());

        let record = task.run("http://a.example/z.txt", &JsonOutput);

        assert_eq!(record.category, OutcomeCategory::Failure);
        assert_eq!(record.destination, Some(destination.clone()));
        assert!(record.error.unwrap().starts_with("request failed:"));
        assert!(destination.as_std_path().is_dir());
    }

    #[test]
    fn invalid_url_fails_without_destination() {
        let (_temp, resolver) = temp_resolver();
        let transport = MockTransport::default();
        let task = DownloadTask::new(&transport, &resolver, TaskOptions::default());

        let record = task.run("::nope::", &JsonOutput);

        assert_eq!(record.category, OutcomeCategory::Failure);
        assert_eq!(record.destination, None);
    }
}
