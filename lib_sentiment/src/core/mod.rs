//! # Core Engine Module
//!
//! The stateful half of the client. Decoded records enter here and leave as
//! immutable snapshots.
//!
//! ## Core Components:
//!
//! - **`aggregator`**: the single owner of the running totals. Applies each
//!   delta with clamping to [0, 100] and keeps a bounded history per category.
//!
//! - **`dispatcher`**: the snapshot publisher. Answers reads, fans snapshots
//!   out to subscribers and pushes the focused category to the widget sink.
//!
//! - **`lifecycle`**: the connection state machine. Owns the one stream task,
//!   tags every attempt with an epoch and tears it down on disconnect.

#![forbid(unsafe_code)]

/// Clamped cumulative values and bounded history buffers.
pub mod aggregator;
/// Snapshot fan-out, read accessors and widget pushes.
pub mod dispatcher;
/// Connect, disconnect and reconnect of the single stream connection.
pub mod lifecycle;

// --- Public API Re-exports ---
pub use aggregator::{AggregationEngine, HistoryBuffer};
pub use dispatcher::SnapshotPublisher;
pub use lifecycle::ConnectionController;
