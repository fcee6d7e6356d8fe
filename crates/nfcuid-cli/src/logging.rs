//! Tracing subscriber set-up for the `nfcuid` binary.

use chrono::Local;
use nfcuid_core::constants::APP_NAME;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str =
    "nfcuid=info,nfcuid_cli=info,nfcuid_service=info,nfcuid_hardware=info,nfcuid_core=info";

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Directory of the per-run log file; `None` logs to stdout only.
    pub dir: Option<PathBuf>,
}

/// Result of [`init_logging`].
#[derive(Debug)]
pub enum LogTarget {
    StdoutOnly,
    File(PathBuf),
    /// The log file could not be created; logging continues on stdout.
    FileUnavailable { path: PathBuf, error: io::Error },
}

/// Name of a log file started at `now`.
pub fn log_file_name(now: chrono::DateTime<Local>) -> String {
    format!("{}_{}.log", APP_NAME, now.format("%Y-%m-%d_%H-%M-%S"))
}

fn create_log_file(dir: &Path) -> (PathBuf, io::Result<File>) {
    let path = dir.join(log_file_name(Local::now()));
    let file = fs::create_dir_all(dir).and_then(|_| File::create(&path));
    (path, file)
}

/// Install the global subscriber: stdout always, plus a plain-text file
/// layer when a log directory is configured and writable.
pub fn init_logging(config: &LogConfig) -> LogTarget {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (target, file) = match &config.dir {
        None => (LogTarget::StdoutOnly, None),
        Some(dir) => match create_log_file(dir) {
            (path, Ok(file)) => (LogTarget::File(path), Some(file)),
            (path, Err(error)) => (LogTarget::FileUnavailable { path, error }, None),
        },
    };

    let file_layer = file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .with(file_layer)
        .init();

    match &target {
        LogTarget::StdoutOnly => {}
        LogTarget::File(path) => tracing::info!(path = %path.display(), "logging to file"),
        LogTarget::FileUnavailable { path, error } => {
            tracing::warn!(path = %path.display(), %error, "could not create log file, logging to stdout only");
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name_format() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(log_file_name(now), "nfcuid_2024-03-09_07-05-01.log");
    }

    #[test]
    fn test_create_log_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("nested").join("logs");

        let (path, file) = create_log_file(&logs);
        assert!(file.is_ok());
        assert!(path.starts_with(&logs));
        assert!(path.exists());
    }

    #[test]
    fn test_create_log_file_fails_under_a_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        File::create(&blocker).unwrap();

        let (_, file) = create_log_file(&blocker);
        assert!(file.is_err());
    }
}
