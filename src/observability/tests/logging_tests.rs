use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use tracing_appender::rolling::Rotation;

use crate::observability::logging::{cleanup_old_log_files, init_logging, LoggingConfig};

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();

    assert_eq!(config.level, "info");
    assert!(config.console_output);
    assert!(config.file_output);
    assert_eq!(config.log_dir, PathBuf::from("./logs"));
    assert_eq!(config.rotation, Rotation::DAILY);
    assert_eq!(config.max_log_files, Some(30));
}

#[test]
fn test_logging_config_logs_under_data_dir() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = LoggingConfig::from_env(temp_dir.path());

    assert_eq!(config.log_dir, temp_dir.path().join("logs"));
}

#[test]
fn test_no_outputs_is_rejected() {
    let config = LoggingConfig {
        console_output: false,
        file_output: false,
        ..Default::default()
    };

    assert!(init_logging(config).is_err());
}

#[test]
fn test_cleanup_keeps_newest_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let dir = temp_dir.path();
    for day in 1..=5 {
        fs::write(dir.join(format!("lnurld.log.2024-01-0{day}")), b"{}").expect("write");
        // mtime resolution on some filesystems is coarse
        std::thread::sleep(std::time::Duration::from_millis(20));
    }
    fs::write(dir.join("unrelated.txt"), b"keep").expect("write");

    cleanup_old_log_files(dir, 2).expect("cleanup");

    let mut remaining: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .filter_map(|e| e.ok()?.file_name().into_string().ok())
        .collect();
    remaining.sort();
    assert_eq!(
        remaining,
        vec![
            "lnurld.log.2024-01-04".to_string(),
            "lnurld.log.2024-01-05".to_string(),
            "unrelated.txt".to_string(),
        ]
    );
}
