use std::fs;

use camino::Utf8PathBuf;

use batchget::domain::{BatchOutcome, OutcomeRecord};
use batchget::ledger::{
    EXISTS_LOG, FAILED_LOG, FINISHED_LOG, Ledger, SUCCESS_LOG, WAITING_FILE,
};

fn temp_ledger() -> (tempfile::TempDir, Ledger) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, Ledger::new(root))
}

fn read(ledger: &Ledger, name: &str) -> Option<String> {
    fs::read_to_string(ledger.path(name).as_std_path()).ok()
}

#[test]
fn clean_batch_finishes_and_clears_waiting() {
    let (_temp, ledger) = temp_ledger();
    fs::write(ledger.path(WAITING_FILE).as_std_path(), "http://a.example/x\n").unwrap();
    let urls = vec!["http://a.example/x".to_string(), "http://a.example/y".to_string()];
    let mut batch = BatchOutcome::new(2);
    batch.push(OutcomeRecord::exists(&urls[0], Utf8PathBuf::from("x")));
    batch.push(OutcomeRecord::success(&urls[1], Utf8PathBuf::from("y")));

    let report = ledger.record(&urls, &batch);

    assert!(report.finished);
    assert!(report.write_errors.is_empty());
    assert_eq!(read(&ledger, EXISTS_LOG).unwrap(), "http://a.example/x");
    assert_eq!(read(&ledger, SUCCESS_LOG).unwrap(), "http://a.example/y");
    assert_eq!(
        read(&ledger, FINISHED_LOG).unwrap(),
        "http://a.example/x\nhttp://a.example/y"
    );
    assert_eq!(read(&ledger, WAITING_FILE).unwrap(), "");
    assert!(read(&ledger, FAILED_LOG).is_none());
}

#[test]
fn failed_batch_keeps_waiting_file() {
    let (_temp, ledger) = temp_ledger();
    fs::write(ledger.path(WAITING_FILE).as_std_path(), "pending").unwrap();
    let urls = vec!["http://a.example/x".to_string(), "http://a.example/z".to_string()];
    let mut batch = BatchOutcome::new(2);
    batch.push(OutcomeRecord::success(&urls[0], Utf8PathBuf::from("x")));
    batch.push(OutcomeRecord::failure(&urls[1], None, "refused"));

    let report = ledger.record(&urls, &batch);

    assert!(!report.finished);
    assert_eq!(read(&ledger, FAILED_LOG).unwrap(), "http://a.example/z");
    assert_eq!(read(&ledger, WAITING_FILE).unwrap(), "pending");
    assert!(read(&ledger, FINISHED_LOG).is_none());
    assert!(read(&ledger, EXISTS_LOG).is_none());
}

#[test]
fn repeated_runs_append_on_new_lines() {
    let (_temp, ledger) = temp_ledger();
    let urls = vec!["http://a.example/z".to_string()];
    let mut batch = BatchOutcome::new(1);
    batch.push(OutcomeRecord::failure(&urls[0], None, "refused"));

    ledger.record(&urls, &batch);
    ledger.record(&urls, &batch);

    assert_eq!(
        read(&ledger, FAILED_LOG).unwrap(),
        "http://a.example/z\nhttp://a.example/z"
    );
}

#[test]
fn unwritable_root_is_reported_not_raised() {
    let (_temp, ledger) = temp_ledger();
    let blocked = Ledger::new(ledger.root().join("missing-dir"));
    let urls = vec!["http://a.example/y".to_string()];
    let mut batch = BatchOutcome::new(1);
    batch.push(OutcomeRecord::success(&urls[0], Utf8PathBuf::from("y")));

    let report = blocked.record(&urls, &batch);

    assert!(report.finished);
    assert_eq!(report.write_errors.len(), 3);
}
