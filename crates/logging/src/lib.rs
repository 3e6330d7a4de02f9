//! Logging initialization for the symdex application.
//!
//! Two modes:
//! - CLI mode: human-readable logs to STDERR (STDOUT carries the emitted
//!   index document).
//! - File mode: JSON logs to a rolling file in the given directory.
//!
//! File logs are rolled over when they reach 5 MB. Rotated logs are
//! compressed. The maximum number of rotated logs is 20.

use anyhow::Result;
use file_rotate::{ContentLimit, FileRotate, compression::Compression, suffix::AppendCount};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub enum LogMode {
    Cli,
    File(PathBuf),
}

/// Guard that keeps background logging workers alive.
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

pub fn init(mode: LogMode, verbose: bool) -> Result<Option<LoggingGuards>> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    match mode {
        LogMode::Cli => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            Ok(None)
        }
        LogMode::File(log_dir) => {
            std::fs::create_dir_all(&log_dir)?;
            let writer = FileRotate::new(
                log_dir.join("symdex.log"),
                AppendCount::new(20),
                ContentLimit::Bytes(5 * 1024 * 1024),
                Compression::OnRotate(1),
                None,
            );

            let (non_blocking, guard) = tracing_appender::non_blocking(writer);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .with_ansi(false)
                .json()
                .init();

            Ok(Some(LoggingGuards {
                _guards: vec![guard],
            }))
        }
    }
}
