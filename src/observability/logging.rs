use std::fs::{self, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Registry};

pub const LOG_FILE_PREFIX: &str = "lnurld.log";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    pub log_dir: PathBuf,
    pub rotation: Rotation,
    pub max_log_files: Option<usize>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: true,
            log_dir: PathBuf::from("./logs"),
            rotation: Rotation::DAILY,
            max_log_files: Some(30),
        }
    }
}

impl LoggingConfig {
    /// `LOG_LEVEL`, `NO_CONSOLE_LOG` and `NO_FILE_LOG` applied on top of the
    /// defaults, logging into `<data_dir>/logs`.
    pub fn from_env(data_dir: &Path) -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            console_output: std::env::var("NO_CONSOLE_LOG").is_err(),
            file_output: std::env::var("NO_FILE_LOG").is_err(),
            log_dir: data_dir.join("logs"),
            ..Default::default()
        }
    }
}

/// Install the global subscriber: pretty console output and a rolling JSON
/// file, either of which can be switched off.
pub fn init_logging(config: LoggingConfig) -> anyhow::Result<()> {
    if !config.console_output && !config.file_output {
        return Err(anyhow!(
            "At least one output (console or file) must be enabled"
        ));
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = if config.file_output {
        prepare_log_dir(&config)?;
        let appender = RollingFileAppender::new(config.rotation, &config.log_dir, LOG_FILE_PREFIX);
        Some(
            fmt::layer()
                .json()
                .with_writer(appender)
                .with_current_span(true)
                .with_span_list(true),
        )
    } else {
        None
    };

    let console_layer = config
        .console_output
        .then(|| fmt::layer().pretty().with_thread_ids(true).with_target(true));

    Registry::default()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("global tracing subscriber already installed")?;

    Ok(())
}

fn prepare_log_dir(config: &LoggingConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&config.log_dir)?;
    // rwxr-x---
    fs::set_permissions(&config.log_dir, Permissions::from_mode(0o750))?;

    if let Some(max_files) = config.max_log_files {
        cleanup_old_log_files(&config.log_dir, max_files)?;
    }
    Ok(())
}

/// Keep the `max_files` most recently modified log files.
pub fn cleanup_old_log_files(log_dir: &Path, max_files: usize) -> anyhow::Result<()> {
    let mut log_files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            let name = path.file_name()?.to_str()?;
            if path.is_file() && name.starts_with(LOG_FILE_PREFIX) {
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some((path, modified))
            } else {
                None
            }
        })
        .collect();

    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(max_files) {
        if let Err(e) = fs::remove_file(path) {
            eprintln!("Failed to remove old log file {:?}: {}", path, e);
        }
    }

    Ok(())
}
