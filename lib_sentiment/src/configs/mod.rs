//! # Configuration Modules
//!
//! Runtime settings for the stream engine. Every field has a default so an
//! empty JSON object is a valid configuration.

/// Endpoint, aggregation and reconnect settings.
pub mod stream_config;

pub use stream_config::{StreamConfig, WidgetMode};
