//! # Delta Records
//!
//! A `DeltaRecord` is one sentiment event as pushed by the backend:
//!
//! ```json
//! {
//!   "timestamp": "2025-07-28T10:15:00Z",
//!   "sentiment": {
//!     "calm": 1.5, "focused": -0.5, "motivated": 0.0, "light-hearted": 2.0,
//!     "inspired": 0.25, "connected": -1.0, "stimulated": 0.0, "curious": 3.0,
//!     "onehourbefore": 41.0, "sixhoursbefore": 38.5
//!   }
//! }
//! ```
//!
//! Every category key is required. The four lookback fields are optional
//! reference values for display and are never accumulated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::{Category, CategoryValues};
use crate::types::{StreamError, StreamResult};

/// Informational reference values shipped alongside each delta.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Lookbacks {
    pub one_hour_before: Option<f64>,
    pub six_hours_before: Option<f64>,
    pub one_day_before: Option<f64>,
    pub one_week_before: Option<f64>,
}

/// One decoded stream event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaRecord {
    /// Server-issued UTC timestamp, kept verbatim.
    pub timestamp: String,
    /// Signed change per category.
    pub deltas: CategoryValues,
    pub lookbacks: Lookbacks,
}

impl DeltaRecord {
    pub fn new(timestamp: impl Into<String>, deltas: CategoryValues) -> Self {
        Self {
            timestamp: timestamp.into(),
            deltas,
            lookbacks: Lookbacks::default(),
        }
    }

    /// Convenience constructor: zero delta everywhere except `category`.
    pub fn single(timestamp: impl Into<String>, category: Category, delta: f64) -> Self {
        let mut deltas = CategoryValues::default();
        deltas[category] = delta;
        Self::new(timestamp, deltas)
    }

    pub fn with_lookbacks(mut self, lookbacks: Lookbacks) -> Self {
        self.lookbacks = lookbacks;
        self
    }

    pub fn delta(&self, category: Category) -> f64 {
        self.deltas[category]
    }

    /// The timestamp parsed as RFC 3339, if it is one.
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Decodes a `data:` payload into a record.
    ///
    /// Fails with [`StreamError::Decode`] on malformed JSON, on a missing
    /// category key, or on a non-finite delta.
    pub fn from_json(payload: &str) -> StreamResult<Self> {
        let wire: WireRecord = serde_json::from_str(payload)
            .map_err(|e| StreamError::Decode(format!("Invalid sentiment frame: {}", e)))?;
        Self::try_from(wire)
    }
}

// --- Wire schema ---

#[derive(Debug, Deserialize)]
pub(crate) struct WireRecord {
    timestamp: String,
    sentiment: WireSentiment,
}

#[derive(Debug, Deserialize)]
struct WireSentiment {
    calm: f64,
    focused: f64,
    motivated: f64,
    #[serde(rename = "light-hearted")]
    light_hearted: f64,
    inspired: f64,
    connected: f64,
    stimulated: f64,
    curious: f64,
    #[serde(default)]
    onehourbefore: Option<f64>,
    #[serde(default)]
    sixhoursbefore: Option<f64>,
    #[serde(default)]
    onedaybefore: Option<f64>,
    #[serde(default)]
    oneweekbefore: Option<f64>,
}

impl TryFrom<WireRecord> for DeltaRecord {
    type Error = StreamError;

    fn try_from(wire: WireRecord) -> StreamResult<Self> {
        let s = wire.sentiment;
        let mut deltas = CategoryValues::default();
        deltas[Category::Calm] = s.calm;
        deltas[Category::Connected] = s.connected;
        deltas[Category::Motivated] = s.motivated;
        deltas[Category::Stimulated] = s.stimulated;
        deltas[Category::Focused] = s.focused;
        deltas[Category::LightHearted] = s.light_hearted;
        deltas[Category::Inspired] = s.inspired;
        deltas[Category::Curious] = s.curious;

        if let Some((category, value)) = deltas.iter().find(|(_, v)| !v.is_finite()) {
            return Err(StreamError::Decode(format!(
                "Non-finite delta {} for {}",
                value, category
            )));
        }

        Ok(DeltaRecord {
            timestamp: wire.timestamp,
            deltas,
            lookbacks: Lookbacks {
                one_hour_before: s.onehourbefore,
                six_hours_before: s.sixhoursbefore,
                one_day_before: s.onedaybefore,
                one_week_before: s.oneweekbefore,
            },
        })
    }
}
