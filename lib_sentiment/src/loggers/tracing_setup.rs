use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::types::{StreamError, StreamResult};

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Filter directive used when `RUST_LOG` is not set, e.g. `info` or `lib_sentiment=debug`.
    pub level: String,
    /// Directory for daily-rolling JSON files. `None` logs to the console only.
    pub log_dir: Option<PathBuf>,
    /// File name prefix; the date is appended by the appender.
    pub file_prefix: String,
    pub ansi: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            file_prefix: "sentiment".to_string(),
            ansi: true,
        }
    }
}

/// Keeps the background file writer alive. Dropping it flushes pending lines.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Non-blocking writer over a daily-rolling file in `dir`, creating `dir` if needed.
pub fn rolling_file_writer(dir: &Path, prefix: &str) -> StreamResult<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(dir)?;
    let appender = rolling::daily(dir, prefix);
    Ok(tracing_appender::non_blocking(appender))
}

/// Installs the global subscriber: env filter, console output and an optional
/// JSON file layer. Records sent through `log` are forwarded as well.
///
/// # Errors
/// `InvalidConfig` for an unparsable filter or when a global subscriber is
/// already set, `Io` when the log directory cannot be created.
pub fn init(options: &LoggingOptions) -> StreamResult<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.level))
        .map_err(|e| StreamError::InvalidConfig(format!("Invalid log level {}: {}", options.level, e)))?;

    let console_layer = fmt::layer().with_target(true).with_ansi(options.ansi);

    let (file_layer, file_guard) = match &options.log_dir {
        Some(dir) => {
            let (writer, guard) = rolling_file_writer(dir, &options.file_prefix)?;
            let layer = fmt::layer().with_ansi(false).with_writer(writer).json();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| StreamError::InvalidConfig(format!("Logging already initialized: {}", e)))?;

    log::info!("Logging initialized with level: {}", options.level);
    Ok(LoggingGuard { _file: file_guard })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rolling_writer_creates_directory_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("logs");

        let (mut writer, guard) = rolling_file_writer(&dir, "unit").unwrap();
        writer.write_all(b"{\"msg\":\"hello\"}\n").unwrap();
        drop(guard);

        let files: Vec<_> = fs::read_dir(&dir).unwrap().filter_map(Result::ok).collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().to_string_lossy().to_string();
        assert!(name.starts_with("unit"));
        let content = fs::read_to_string(files[0].path()).unwrap();
        assert!(content.contains("hello"));
    }
}
