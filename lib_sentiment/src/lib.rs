//! # lib_sentiment
//!
//! Core engine for the mood tracker client: it keeps a single server-sent-events
//! connection to the sentiment backend, decodes incremental delta frames, folds
//! them into clamped per-category running totals with bounded history, and
//! publishes immutable snapshots to UI observers and to an optional widget sink.
//!
//! ## Layout
//! - **`model`**: the closed `Category` set, wire `DeltaRecord`s and snapshots.
//! - **`ingestors`**: the stream transport seam and the SSE frame decoder.
//! - **`core`**: aggregation engine, snapshot dispatcher and connection lifecycle.
//! - **`platform`**: capability interfaces for widgets and session gating.
//! - **`configs`**: runtime configuration with serde defaults.
//! - **`loggers`** (feature `loggers`): tracing subscriber setup.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod configs;
pub mod core;
pub mod ingestors;
#[cfg(feature = "loggers")]
pub mod loggers;
pub mod model;
pub mod platform;
pub mod types;

// --- Public API Re-exports ---
pub use crate::configs::{StreamConfig, WidgetMode};
pub use crate::core::{AggregationEngine, ConnectionController, SnapshotPublisher};
pub use crate::ingestors::{ByteStream, FrameDecoder, StreamTransport, TranscriptTransport};
#[cfg(feature = "transport")]
pub use crate::ingestors::HttpSseTransport;
pub use crate::model::{Category, CategoryValues, DeltaRecord, Lookbacks, SentimentSnapshot};
pub use crate::platform::{SessionFlag, SessionGate, WidgetSink};
pub use crate::types::{ConnectionState, ConnectionStatus, StreamError, StreamResult};
