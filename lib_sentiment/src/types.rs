// Common types shared by the transport, decoder and lifecycle controller

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur while ingesting the sentiment stream
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    #[error("Connection error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unknown sentiment category: {0}")]
    UnknownCategory(String),

    #[error("No valid session, refusing to connect")]
    NoSession,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle state of the single stream connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", content = "reason")]
pub enum ConnectionState {
    /// No connection and none being attempted
    #[default]
    Disconnected,

    /// Transport attempt in flight
    Connecting,

    /// Transport accepted, frames are flowing
    Connected,

    /// The attempt or the open stream failed; transient, followed by `Disconnected`
    Failed(String),
}

impl ConnectionState {
    /// `Connecting` and `Connected` both count as an active connection.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

/// Externally visible connection status, copied out on every read
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Human-readable reason of the most recent connection failure
    pub last_error: Option<String>,
    /// Incremented every time a new connection attempt starts
    pub epoch: u64,
    /// Number of transport attempts made over the session
    pub attempts: u64,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}
