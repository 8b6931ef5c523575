//! # Snapshot Publisher
//!
//! Sits between the aggregation engine and everything that wants to look at
//! it: UI observers, headless subscribers and the widget sink.
//!
//! ## Key Features:
//!
//! 1.  **Shared Fan-out**: every applied record produces one snapshot wrapped in
//!     an `Arc`. Each subscriber receives a clone of the pointer, not of the data.
//!
//! 2.  **Latest Value**: a `watch` channel always holds the newest snapshot, so
//!     late observers start from current state instead of replaying history.
//!
//! 3.  **Lazy Cleanup**: subscribers whose receiver was dropped are removed with
//!     `retain` on the next publish.
//!
//! 4.  **Widget Push**: when a category is focused, each publish also pushes a
//!     `WidgetUpdate` for it to the configured `WidgetSink`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};

use crate::configs::StreamConfig;
use crate::core::aggregator::AggregationEngine;
use crate::model::{Category, DeltaRecord, SentimentSnapshot, Trend, WidgetUpdate};
use crate::platform::WidgetSink;

/// A registered snapshot consumer.
struct SubscriberHandle {
    id: String,
    sender: mpsc::UnboundedSender<Arc<SentimentSnapshot>>,
}

/// Read interface over the aggregated state plus push fan-out.
pub struct SnapshotPublisher {
    engine: Mutex<AggregationEngine>,
    latest: watch::Sender<Arc<SentimentSnapshot>>,
    subscribers: Mutex<Vec<SubscriberHandle>>,
    focus: Mutex<Option<Category>>,
    widget: Arc<dyn WidgetSink>,
    widget_active: AtomicBool,
    history_limit: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SnapshotPublisher {
    pub fn new(engine: AggregationEngine, widget: Arc<dyn WidgetSink>, history_limit: usize) -> Self {
        let (latest, _) = watch::channel(Arc::new(engine.snapshot()));
        Self {
            engine: Mutex::new(engine),
            latest,
            subscribers: Mutex::new(Vec::new()),
            focus: Mutex::new(None),
            widget,
            widget_active: AtomicBool::new(false),
            history_limit,
        }
    }

    pub fn from_config(config: &StreamConfig, widget: Arc<dyn WidgetSink>) -> Self {
        Self::new(AggregationEngine::from_config(config), widget, config.history_limit)
    }

    /// Applies `record` to the engine and publishes the result.
    ///
    /// Must only be called from the task that owns the stream, so that records
    /// are applied in arrival order.
    pub fn apply(&self, record: &DeltaRecord) -> Arc<SentimentSnapshot> {
        let snapshot = Arc::new(lock(&self.engine).apply_delta(record));
        self.publish(&snapshot);
        snapshot
    }

    fn publish(&self, snapshot: &Arc<SentimentSnapshot>) {
        // Widget first: observers woken below can rely on the push having happened.
        if let Some(category) = self.focus() {
            let update = WidgetUpdate::from_snapshot(snapshot, category, snapshot.last_delta(category));
            self.widget.update(&update);
        }

        lock(&self.subscribers).retain(|sub| match sub.sender.send(Arc::clone(snapshot)) {
            Ok(()) => true,
            Err(_) => {
                log::info!("Subscriber '{}' went away. Removing from publisher.", sub.id);
                false
            }
        });

        self.latest.send_replace(Arc::clone(snapshot));
    }

    // --- Reads ---

    pub fn snapshot(&self) -> Arc<SentimentSnapshot> {
        Arc::clone(&self.latest.borrow())
    }

    /// Clamped value of `category`, 0 before any data.
    pub fn current_value(&self, category: Category) -> f64 {
        self.snapshot().current_value(category)
    }

    /// Last `limit` history points of `category`, oldest first; empty before any data.
    pub fn history(&self, category: Category, limit: usize) -> Vec<f64> {
        self.snapshot().history(category, limit)
    }

    /// [`history`](Self::history) with the configured default limit.
    pub fn recent_history(&self, category: Category) -> Vec<f64> {
        self.history(category, self.history_limit)
    }

    pub fn trend(&self, category: Category) -> Trend {
        Trend::of(self.snapshot().full_history(category))
    }

    pub fn recent_records(&self, limit: usize) -> Vec<DeltaRecord> {
        lock(&self.engine).recent_records(limit)
    }

    pub fn latest_record(&self) -> Option<DeltaRecord> {
        lock(&self.engine).latest_record().cloned()
    }

    // --- Observers ---

    /// Registers a subscriber that receives every published snapshot.
    pub fn add_subscriber(&self, id: &str) -> mpsc::UnboundedReceiver<Arc<SentimentSnapshot>> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(SubscriberHandle {
            id: id.to_string(),
            sender: tx,
        });
        log::info!("Subscriber '{}' registered", id);
        rx
    }

    pub fn remove_subscriber(&self, id: &str) {
        lock(&self.subscribers).retain(|sub| sub.id != id);
        log::info!("Subscriber '{}' explicitly removed.", id);
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Latest-value channel; starts at the current snapshot.
    pub fn subscribe_latest(&self) -> watch::Receiver<Arc<SentimentSnapshot>> {
        self.latest.subscribe()
    }

    // --- Focus and widgets ---

    pub fn focus(&self) -> Option<Category> {
        *lock(&self.focus)
    }

    pub fn set_focus(&self, category: Option<Category>) {
        *lock(&self.focus) = category;
    }

    pub fn clear_focus(&self) {
        self.set_focus(None);
    }

    /// Focuses `category` and starts its widget with the current value and a
    /// zero delta. Returns whether the sink accepted the start.
    pub fn start_widget(&self, category: Category) -> bool {
        self.set_focus(Some(category));
        let snapshot = self.snapshot();
        let update = WidgetUpdate::from_snapshot(&snapshot, category, 0.0);
        let started = self.widget.start(&update);
        self.widget_active.store(started, Ordering::SeqCst);
        if started {
            log::info!("Widget started for {}", category);
        }
        started
    }

    /// Clears focus and ends every widget.
    pub fn stop_all_widgets(&self) {
        self.clear_focus();
        self.widget.stop_all();
        self.widget_active.store(false, Ordering::SeqCst);
    }

    pub fn widget_active(&self) -> bool {
        self.widget_active.load(Ordering::SeqCst)
    }

    /// Discards all aggregated state and publishes the seeded snapshot.
    pub fn reset(&self) {
        let snapshot = {
            let mut engine = lock(&self.engine);
            engine.reset();
            Arc::new(engine.snapshot())
        };
        self.latest.send_replace(snapshot);
    }
}
