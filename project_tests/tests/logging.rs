//! Global subscriber setup. Kept in its own test binary because a process can
//! only install one global subscriber.

use std::fs;

use lib_sentiment::loggers::{init, LoggingOptions};
use tempfile::tempdir;

#[test]
fn log_records_reach_the_json_file() {
    let temp_dir = tempdir().expect("Failed to create temporary directory");
    let log_dir = temp_dir.path().join("logs");

    let options = LoggingOptions {
        level: "debug".to_string(),
        log_dir: Some(log_dir.clone()),
        file_prefix: "pipeline".to_string(),
        ansi: false,
    };
    let guard = init(&options).expect("Failed to initialize logging");

    log::warn!("Skipping malformed sentiment frame: test marker");
    drop(guard);

    let files: Vec<_> = fs::read_dir(&log_dir)
        .expect("Failed to read log directory")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    assert_eq!(files.len(), 1, "Expected exactly one log file");

    let contents = fs::read_to_string(&files[0]).expect("Failed to read log file");
    let line = contents
        .lines()
        .find(|l| l.contains("test marker"))
        .expect("Warning not found in log file");
    let json: serde_json::Value = serde_json::from_str(line).expect("Log line is not JSON");
    assert_eq!(json["level"], "WARN");

    // A second global subscriber is refused.
    assert!(init(&LoggingOptions::default()).is_err());
}
