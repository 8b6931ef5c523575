use std::fs;
use std::path::PathBuf;

use clap::Args;
use serde::{Deserialize, Serialize};

use lib_sentiment::loggers::LoggingOptions;
use lib_sentiment::{StreamConfig, WidgetMode};

const DEFAULT_CONFIG_FILE: &str = "sentiment.conf";

/// Layered settings. Every field is optional so that sources can be merged;
/// `None` means "not set here".
#[derive(Args, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[arg(long, global = true, env = "SENTIMENT_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[arg(long, global = true, env = "SENTIMENT_BASE_URL", help = "Backend origin, e.g. https://host:5003.")]
    pub base_url: Option<String>,

    #[arg(long, global = true, env = "SENTIMENT_STREAM_PATH", help = "Path of the SSE endpoint.")]
    pub stream_path: Option<String>,

    #[arg(long, global = true, env = "SENTIMENT_API_KEY", hide_env_values = true, help = "API key sent as X-API-Key.")]
    pub api_key: Option<String>,

    #[arg(long, global = true, env = "SENTIMENT_INITIAL_VALUE", help = "Starting value of every category.")]
    pub initial_value: Option<f64>,

    #[arg(long, global = true, env = "SENTIMENT_HISTORY_CAPACITY", help = "History entries kept per category.")]
    pub history_capacity: Option<usize>,

    #[arg(long, global = true, env = "SENTIMENT_HISTORY_LIMIT", help = "History points shown per category.")]
    pub history_limit: Option<usize>,

    #[arg(long, global = true, env = "SENTIMENT_RECONNECT_DELAY_MS", help = "Delay before reconnecting, in milliseconds.")]
    pub reconnect_delay_ms: Option<u64>,

    #[arg(long, global = true, env = "SENTIMENT_CONNECT_TIMEOUT_SECS", help = "Connect timeout in seconds.")]
    pub connect_timeout_secs: Option<u64>,

    #[arg(long, global = true, env = "SENTIMENT_WIDGET", help = "Widget sink: none or log.")]
    pub widget: Option<WidgetMode>,

    #[arg(long, global = true, env = "SENTIMENT_LOG_DIR", help = "Directory for JSON log files.")]
    pub log_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "SENTIMENT_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,
}

impl Settings {
    /// Field-by-field merge where `other` wins for every `Some`.
    pub fn merge(self, other: Settings) -> Settings {
        Settings {
            config_path: other.config_path.or(self.config_path),
            base_url: other.base_url.or(self.base_url),
            stream_path: other.stream_path.or(self.stream_path),
            api_key: other.api_key.or(self.api_key),
            initial_value: other.initial_value.or(self.initial_value),
            history_capacity: other.history_capacity.or(self.history_capacity),
            history_limit: other.history_limit.or(self.history_limit),
            reconnect_delay_ms: other.reconnect_delay_ms.or(self.reconnect_delay_ms),
            connect_timeout_secs: other.connect_timeout_secs.or(self.connect_timeout_secs),
            widget: other.widget.or(self.widget),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
        }
    }

    pub fn defaults() -> Settings {
        let stream = StreamConfig::default();
        Settings {
            config_path: None,
            base_url: Some(stream.base_url),
            stream_path: Some(stream.stream_path),
            api_key: None,
            initial_value: Some(stream.initial_value),
            history_capacity: Some(stream.history_capacity),
            history_limit: Some(stream.history_limit),
            reconnect_delay_ms: Some(stream.reconnect_delay_ms),
            connect_timeout_secs: stream.connect_timeout_secs,
            widget: Some(stream.widget),
            log_dir: None,
            log_level: Some("info".to_string()),
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        let defaults = StreamConfig::default();
        StreamConfig {
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            stream_path: self.stream_path.clone().unwrap_or(defaults.stream_path),
            api_key: self.api_key.clone().unwrap_or_default(),
            initial_value: self.initial_value.unwrap_or(defaults.initial_value),
            history_capacity: self.history_capacity.unwrap_or(defaults.history_capacity),
            history_limit: self.history_limit.unwrap_or(defaults.history_limit),
            reconnect_delay_ms: self.reconnect_delay_ms.unwrap_or(defaults.reconnect_delay_ms),
            connect_timeout_secs: self.connect_timeout_secs.or(defaults.connect_timeout_secs),
            widget: self.widget.unwrap_or(defaults.widget),
            ..defaults
        }
    }

    pub fn logging_options(&self) -> LoggingOptions {
        LoggingOptions {
            level: self.log_level.clone().unwrap_or_else(|| "info".to_string()),
            log_dir: self.log_dir.clone(),
            file_prefix: "sentiment-tail".to_string(),
            ..LoggingOptions::default()
        }
    }
}

/// Resolves settings: built-in defaults, then the JSON config file, then
/// environment variables and command-line flags (already parsed into `cli`).
///
/// Logging is not set up yet when this runs, so problems with the config file
/// are returned as notes for the caller to log.
pub fn resolve(cli: Settings) -> (Settings, Vec<String>) {
    let mut notes = Vec::new();
    let mut current = Settings::defaults();

    let path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if path.exists() {
        match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Settings>(&raw) {
                Ok(file_settings) => current = current.merge(file_settings),
                Err(e) => notes.push(format!(
                    "Failed to parse config file {}: {}. Falling back to other sources.",
                    path.display(),
                    e
                )),
            },
            Err(e) => notes.push(format!(
                "Failed to read config file {}: {}. Falling back to other sources.",
                path.display(),
                e
            )),
        }
    } else {
        notes.push(format!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            path.display()
        ));
    }

    (current.merge(cli), notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn later_sources_win_field_by_field() {
        let base = Settings {
            base_url: Some("http://a".into()),
            history_limit: Some(10),
            ..Default::default()
        };
        let over = Settings {
            base_url: Some("http://b".into()),
            ..Default::default()
        };
        let merged = base.merge(over);
        assert_eq!(merged.base_url.as_deref(), Some("http://b"));
        assert_eq!(merged.history_limit, Some(10));
    }

    #[test]
    fn file_overrides_defaults_and_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"baseUrl": "http://127.0.0.1:9999", "apiKey": "from-file", "widget": "log", "historyLimit": 5}}"#
        )
        .unwrap();

        let cli = Settings {
            config_path: Some(file.path().to_path_buf()),
            api_key: Some("from-cli".into()),
            ..Default::default()
        };
        let (settings, notes) = resolve(cli);
        assert!(notes.is_empty());

        let config = settings.stream_config();
        assert_eq!(config.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.api_key, "from-cli");
        assert_eq!(config.widget, WidgetMode::Log);
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.stream_path, "/sentiment/stream");
    }

    #[test]
    fn broken_file_falls_back_with_a_note() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ nope").unwrap();
        let cli = Settings {
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let (settings, notes) = resolve(cli);
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("Failed to parse"));
        assert_eq!(settings.stream_config(), StreamConfig::default());
    }

    #[test]
    fn missing_api_key_means_no_session() {
        let config = Settings::defaults().stream_config();
        assert!(!config.has_api_key());
    }
}
