//! # Logging Setup
//!
//! Library code only talks to the `log` facade. Binaries call [`init`] once to
//! install a `tracing` subscriber that also receives those `log` records.

/// Console and rolling-file subscriber configuration.
pub mod tracing_setup;

pub use tracing_setup::{init, rolling_file_writer, LoggingGuard, LoggingOptions};
