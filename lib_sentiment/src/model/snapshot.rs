//! # Snapshots
//!
//! Observers never touch the engine's state directly. After every applied delta
//! the engine builds a `SentimentSnapshot`, an owned copy of the running totals
//! and history buffers, which is shared behind an `Arc` so fan-out stays cheap.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::category::{Category, CategoryValues};
use super::delta::{DeltaRecord, Lookbacks};

/// Immutable copy of the aggregated state at one point in the stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentSnapshot {
    /// Clamped running totals.
    pub values: CategoryValues,
    /// Per-category history, oldest first.
    pub histories: Vec<Vec<f64>>,
    /// Number of delta records applied this session.
    pub updates_applied: u64,
    /// The record that produced this snapshot.
    pub last_record: Option<DeltaRecord>,
    /// Local time the record was applied.
    pub updated_at: Option<DateTime<Utc>>,
}

impl SentimentSnapshot {
    /// True until the first delta arrives.
    pub fn is_empty(&self) -> bool {
        self.updates_applied == 0
    }

    /// Current value of `category`; 0 before any data has been received.
    pub fn current_value(&self, category: Category) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.values[category].clamp(0.0, 100.0)
    }

    /// The most recent `limit` history entries of `category`, oldest first.
    ///
    /// Empty before any data has been received, which is distinct from a flat
    /// history of unchanged values.
    pub fn history(&self, category: Category, limit: usize) -> Vec<f64> {
        if self.is_empty() {
            return Vec::new();
        }
        let full = self.full_history(category);
        full[full.len().saturating_sub(limit)..].to_vec()
    }

    /// The whole history buffer of `category`, regardless of whether data was received.
    pub fn full_history(&self, category: Category) -> &[f64] {
        self.histories
            .get(category.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Delta most recently applied to `category`, 0 before any data.
    pub fn last_delta(&self, category: Category) -> f64 {
        self.last_record
            .as_ref()
            .map(|r| r.delta(category))
            .unwrap_or(0.0)
    }

    pub fn lookbacks(&self) -> Lookbacks {
        self.last_record
            .as_ref()
            .map(|r| r.lookbacks)
            .unwrap_or_default()
    }
}

/// Direction of the last step in a history series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn of(history: &[f64]) -> Self {
        match history {
            [.., previous, last] if last > previous => Trend::Up,
            [.., previous, last] if last < previous => Trend::Down,
            _ => Trend::Stable,
        }
    }
}

/// Payload pushed to the widget collaborator for the focused category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetUpdate {
    pub category: Category,
    pub current_value: f64,
    pub delta: f64,
    pub history: Vec<f64>,
    pub lookbacks: Lookbacks,
    pub trend: Trend,
    pub updated_at: DateTime<Utc>,
}

impl WidgetUpdate {
    /// Builds the widget payload for `category` from a snapshot.
    ///
    /// `delta` is passed explicitly because a freshly started widget shows no
    /// change even when the snapshot carries one.
    pub fn from_snapshot(snapshot: &SentimentSnapshot, category: Category, delta: f64) -> Self {
        let history = snapshot.full_history(category).to_vec();
        Self {
            category,
            current_value: snapshot.current_value(category),
            delta,
            trend: Trend::of(&history),
            history,
            lookbacks: snapshot.lookbacks(),
            updated_at: snapshot.updated_at.unwrap_or_else(Utc::now),
        }
    }
}
