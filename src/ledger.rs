use std::fs::{self, OpenOptions};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::domain::BatchOutcome;
use crate::error::BatchError;

pub const FAILED_LOG: &str = "download-failed.txt";
pub const EXISTS_LOG: &str = "download-exists.txt";
pub const SUCCESS_LOG: &str = "download-success.txt";
pub const FINISHED_LOG: &str = "download-finished.txt";
pub const WAITING_FILE: &str = "download-waiting.txt";

/// What the ledger managed to persist. Write failures are logged, not raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerReport {
    pub finished: bool,
    pub write_errors: Vec<String>,
}

/// Append-only outcome logs rooted at one directory.
#[derive(Debug, Clone)]
pub struct Ledger {
    root: Utf8PathBuf,
}

impl Ledger {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Persists a settled batch. `urls` is the full input list of the run.
    ///
    /// When nothing failed, the input list is appended to the finished log
    /// and the waiting file is truncated.
    pub fn record(&self, urls: &[String], batch: &BatchOutcome) -> LedgerReport {
        let mut report = LedgerReport::default();

        self.append_best_effort(FAILED_LOG, &batch.failed_urls(), &mut report);
        self.append_best_effort(EXISTS_LOG, &batch.existing_urls(), &mut report);
        self.append_best_effort(SUCCESS_LOG, &batch.succeeded_urls(), &mut report);

        if batch.is_complete() {
            let all = urls.iter().map(String::as_str).collect::<Vec<_>>();
            self.append_best_effort(FINISHED_LOG, &all, &mut report);
            if let Err(err) = truncate(&self.path(WAITING_FILE)) {
                warn!(error = %err, "failed to clear waiting file");
                report.write_errors.push(err.to_string());
            }
            report.finished = true;
            info!(total = batch.total, "batch finished without failures");
        } else {
            info!(
                failed = batch.failed.len(),
                total = batch.total,
                "batch left failures, waiting file kept"
            );
        }

        report
    }

    fn append_best_effort(&self, name: &str, lines: &[&str], report: &mut LedgerReport) {
        if let Err(err) = append_lines(&self.path(name), lines) {
            warn!(file = name, error = %err, "failed to append to ledger");
            report.write_errors.push(err.to_string());
        }
    }
}

/// Appends one entry per line. An empty list touches nothing. A newline is
/// prepended when the file already has content, so blocks never run into the
/// previous last line.
pub fn append_lines(path: &Utf8Path, lines: &[&str]) -> Result<(), BatchError> {
    if lines.is_empty() {
        return Ok(());
    }
    let has_content = fs::metadata(path.as_std_path())
        .map(|meta| meta.len() > 0)
        .unwrap_or(false);

    let mut block = String::new();
    if has_content {
        block.push('\n');
    }
    block.push_str(&lines.join("\n"));

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .map_err(|err| BatchError::Filesystem(format!("open {path}: {err}")))?;
    file.write_all(block.as_bytes())
        .map_err(|err| BatchError::Filesystem(format!("append {path}: {err}")))?;
    Ok(())
}

fn truncate(path: &Utf8Path) -> Result<(), BatchError> {
    fs::write(path.as_std_path(), b"")
        .map_err(|err| BatchError::Filesystem(format!("truncate {path}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    #[test]
    fn empty_list_creates_no_file() {
        let (_temp, root) = temp_root();
        let path = root.join("log.txt");

        append_lines(&path, &[]).unwrap();

        assert!(!path.as_std_path().exists());
    }

    #[test]
    fn second_append_starts_on_new_line() {
        let (_temp, root) = temp_root();
        let path = root.join("log.txt");

        append_lines(&path, &["a", "b"]).unwrap();
        append_lines(&path, &["c"]).unwrap();

        let content = fs::read_to_string(path.as_std_path()).unwrap();
        assert_eq!(content, "a\nb\nc");
    }

    #[test]
    fn append_to_empty_existing_file_has_no_leading_newline() {
        let (_temp, root) = temp_root();
        let path = root.join("log.txt");
        fs::write(path.as_std_path(), b"").unwrap();

        append_lines(&path, &["a"]).unwrap();

        assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "a");
    }
}
