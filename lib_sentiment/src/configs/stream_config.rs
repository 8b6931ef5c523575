use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{StreamError, StreamResult};

pub const DEFAULT_BASE_URL: &str = "https://timeline-tuner-backend.soc1024.com:5003";
pub const DEFAULT_STREAM_PATH: &str = "/sentiment/stream";
pub const DEFAULT_INITIAL_VALUE: f64 = 30.0;
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const DEFAULT_RECENT_RECORDS_CAPACITY: usize = 100;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2000;

/// Which widget sink is wired in at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetMode {
    /// Widget platform unavailable; pushes are dropped.
    #[default]
    None,
    /// Widget updates are written to the log.
    Log,
}

impl FromStr for WidgetMode {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(WidgetMode::None),
            "log" => Ok(WidgetMode::Log),
            other => Err(StreamError::InvalidConfig(format!("Unknown widget mode: {}", other))),
        }
    }
}

impl fmt::Display for WidgetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetMode::None => f.write_str("none"),
            WidgetMode::Log => f.write_str("log"),
        }
    }
}

/// Settings for one stream session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamConfig {
    /// Backend origin, e.g. `https://host:5003`.
    pub base_url: String,
    pub stream_path: String,
    /// Sent as `X-API-Key`. An empty key means no valid session.
    pub api_key: String,
    /// Starting value of every category; also seeds each history buffer.
    pub initial_value: f64,
    /// Maximum entries kept per category history.
    pub history_capacity: usize,
    /// Default number of history points returned to readers.
    pub history_limit: usize,
    /// Number of raw records retained for inspection.
    pub recent_records_capacity: usize,
    pub reconnect_delay_ms: u64,
    /// Connect-phase timeout only. The open stream has no read timeout.
    pub connect_timeout_secs: Option<u64>,
    pub widget: WidgetMode,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            api_key: String::new(),
            initial_value: DEFAULT_INITIAL_VALUE,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            history_limit: DEFAULT_HISTORY_LIMIT,
            recent_records_capacity: DEFAULT_RECENT_RECORDS_CAPACITY,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            connect_timeout_secs: Some(30),
            widget: WidgetMode::None,
        }
    }
}

impl StreamConfig {
    /// Reads a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> StreamResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config: StreamConfig = serde_json::from_str(&raw).map_err(|e| {
            StreamError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Checks the values the engine relies on.
    pub fn validate(&self) -> StreamResult<()> {
        if !(0.0..=100.0).contains(&self.initial_value) {
            return Err(StreamError::InvalidConfig(format!(
                "initialValue must be within [0, 100], got {}",
                self.initial_value
            )));
        }
        if self.history_capacity == 0 {
            return Err(StreamError::InvalidConfig("historyCapacity must be at least 1".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(StreamError::InvalidConfig("baseUrl is empty".into()));
        }
        if !self.stream_path.starts_with('/') {
            return Err(StreamError::InvalidConfig(format!(
                "streamPath must start with '/', got {}",
                self.stream_path
            )));
        }
        Ok(())
    }

    /// Full stream URL as a plain string.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.stream_path)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}
