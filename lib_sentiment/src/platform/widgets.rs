//! # Widget Sinks
//!
//! The publisher pushes a [`WidgetUpdate`] for the focused category after
//! every applied record. Where the widget ends up is decided here.

use std::sync::Arc;

use crate::configs::WidgetMode;
use crate::model::WidgetUpdate;

/// Push target for widget updates.
///
/// Calls happen on the stream task, so implementations should hand work off
/// rather than block.
pub trait WidgetSink: Send + Sync {
    /// Starts a widget for `update.category`. Returns `false` when the
    /// platform refused or is unavailable.
    fn start(&self, update: &WidgetUpdate) -> bool;

    /// Refreshes the running widget.
    fn update(&self, update: &WidgetUpdate);

    /// Ends every running widget.
    fn stop_all(&self);
}

/// Builds the sink selected in configuration.
pub fn from_mode(mode: WidgetMode) -> Arc<dyn WidgetSink> {
    match mode {
        WidgetMode::None => Arc::new(NoopWidgetSink),
        WidgetMode::Log => Arc::new(LogWidgetSink),
    }
}

/// Used when no widget platform is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWidgetSink;

impl WidgetSink for NoopWidgetSink {
    fn start(&self, update: &WidgetUpdate) -> bool {
        log::debug!("Widgets unavailable, not starting one for {}", update.category);
        false
    }

    fn update(&self, _update: &WidgetUpdate) {}

    fn stop_all(&self) {}
}

/// Writes widget traffic to the log, one line per push.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWidgetSink;

impl WidgetSink for LogWidgetSink {
    fn start(&self, update: &WidgetUpdate) -> bool {
        log::info!(
            "Widget started for {}: value={:.2} points={}",
            update.category,
            update.current_value,
            update.history.len()
        );
        true
    }

    fn update(&self, update: &WidgetUpdate) {
        log::info!(
            "Widget update for {}: value={:.2} delta={:+.2} trend={:?}",
            update.category,
            update.current_value,
            update.delta,
            update.trend
        );
    }

    fn stop_all(&self) {
        log::info!("All widgets stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Lookbacks, Trend};
    use chrono::Utc;

    fn update() -> WidgetUpdate {
        WidgetUpdate {
            category: Category::Calm,
            current_value: 30.0,
            delta: 0.0,
            history: vec![30.0],
            lookbacks: Lookbacks::default(),
            trend: Trend::Stable,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn mode_selects_sink() {
        assert!(!from_mode(WidgetMode::None).start(&update()));
        assert!(from_mode(WidgetMode::Log).start(&update()));
    }
}
