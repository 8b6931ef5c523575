//! # Sentiment Data Model
//!
//! Strongly-typed representation of what travels over the stream and what the
//! engine hands out to observers.
//!
//! - **`category`**: the closed set of eight sentiment labels and the dense
//!   per-category value table.
//! - **`delta`**: one decoded stream event (`DeltaRecord`) and its wire schema.
//! - **`snapshot`**: immutable copies of the aggregated state and widget payloads.

pub mod category;
pub mod delta;
pub mod snapshot;

pub use category::{Category, CategoryValues};
pub use delta::{DeltaRecord, Lookbacks};
pub use snapshot::{SentimentSnapshot, Trend, WidgetUpdate};
