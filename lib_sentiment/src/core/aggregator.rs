//! # Aggregation Engine
//!
//! Folds `DeltaRecord`s into running per-category totals.
//!
//! For every category on every record:
//!
//! ```text
//! value = clamp(value + delta, 0, 100)
//! history.push(value)        // oldest entry evicted past capacity
//! ```
//!
//! Clamping happens per step, so a large negative delta followed by a positive
//! one starts from 0, not from the unclamped sum. All eight categories are
//! updated before the snapshot is taken; readers never see a half-applied record.

use std::collections::VecDeque;

use chrono::Utc;

use crate::configs::StreamConfig;
use crate::model::{Category, CategoryValues, DeltaRecord, SentimentSnapshot};

const MIN_VALUE: f64 = 0.0;
const MAX_VALUE: f64 = 100.0;

/// Fixed-capacity FIFO of past cumulative values.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffer {
    entries: VecDeque<f64>,
    capacity: usize,
}

impl HistoryBuffer {
    /// A buffer seeded with one entry.
    pub fn seeded(seed: f64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries = VecDeque::with_capacity(capacity);
        entries.push_back(seed);
        Self { entries, capacity }
    }

    pub fn push(&mut self, value: f64) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<f64> {
        self.entries.back().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.entries.iter().copied().collect()
    }
}

/// Exclusive owner of the cumulative state.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    initial_value: f64,
    values: CategoryValues,
    histories: Vec<HistoryBuffer>,
    recent: VecDeque<DeltaRecord>,
    recent_capacity: usize,
    updates_applied: u64,
}

impl AggregationEngine {
    pub fn new(initial_value: f64, history_capacity: usize, recent_capacity: usize) -> Self {
        let initial_value = initial_value.clamp(MIN_VALUE, MAX_VALUE);
        Self {
            initial_value,
            values: CategoryValues::splat(initial_value),
            histories: Category::ALL
                .iter()
                .map(|_| HistoryBuffer::seeded(initial_value, history_capacity))
                .collect(),
            recent: VecDeque::with_capacity(recent_capacity),
            recent_capacity,
            updates_applied: 0,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(
            config.initial_value,
            config.history_capacity,
            config.recent_records_capacity,
        )
    }

    /// Applies one record and returns the resulting snapshot.
    pub fn apply_delta(&mut self, record: &DeltaRecord) -> SentimentSnapshot {
        for category in Category::ALL {
            let next = (self.values[category] + record.delta(category)).clamp(MIN_VALUE, MAX_VALUE);
            self.values[category] = next;
            self.histories[category.index()].push(next);
        }

        if self.recent_capacity > 0 {
            if self.recent.len() == self.recent_capacity {
                self.recent.pop_front();
            }
            self.recent.push_back(record.clone());
        }
        self.updates_applied += 1;

        let mut snapshot = self.snapshot();
        snapshot.last_record = Some(record.clone());
        snapshot.updated_at = Some(Utc::now());
        snapshot
    }

    /// Copy of the current state. `last_record` is the newest retained record.
    pub fn snapshot(&self) -> SentimentSnapshot {
        SentimentSnapshot {
            values: self.values,
            histories: self.histories.iter().map(HistoryBuffer::to_vec).collect(),
            updates_applied: self.updates_applied,
            last_record: self.recent.back().cloned(),
            updated_at: None,
        }
    }

    pub fn value(&self, category: Category) -> f64 {
        self.values[category]
    }

    pub fn history(&self, category: Category) -> &HistoryBuffer {
        &self.histories[category.index()]
    }

    pub fn updates_applied(&self) -> u64 {
        self.updates_applied
    }

    /// Up to `limit` most recent records, oldest first.
    pub fn recent_records(&self, limit: usize) -> Vec<DeltaRecord> {
        let skip = self.recent.len().saturating_sub(limit);
        self.recent.iter().skip(skip).cloned().collect()
    }

    pub fn latest_record(&self) -> Option<&DeltaRecord> {
        self.recent.back()
    }

    /// Back to the seeded state of a fresh session.
    pub fn reset(&mut self) {
        let capacity = self.histories.first().map(HistoryBuffer::capacity).unwrap_or(1);
        *self = Self::new(self.initial_value, capacity, self.recent_capacity);
    }
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}
