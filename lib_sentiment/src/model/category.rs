//! # Sentiment Categories
//!
//! The backend tracks exactly eight feelings. They are modelled as a closed enum
//! so every per-category table is a fixed-size array and a missing or unknown
//! label is caught at the edge instead of silently reading as zero.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::StreamError;

/// One of the eight sentiment labels tracked by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Calm,
    Connected,
    Motivated,
    Stimulated,
    Focused,
    LightHearted,
    Inspired,
    Curious,
}

impl Category {
    /// Number of categories in the closed set.
    pub const COUNT: usize = 8;

    /// Fixed iteration order, also the order of chart series.
    pub const ALL: [Category; Category::COUNT] = [
        Category::Calm,
        Category::Connected,
        Category::Motivated,
        Category::Stimulated,
        Category::Focused,
        Category::LightHearted,
        Category::Inspired,
        Category::Curious,
    ];

    /// Wire name used as the JSON key and in widget payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Calm => "calm",
            Category::Connected => "connected",
            Category::Motivated => "motivated",
            Category::Stimulated => "stimulated",
            Category::Focused => "focused",
            Category::LightHearted => "light-hearted",
            Category::Inspired => "inspired",
            Category::Curious => "curious",
        }
    }

    /// Position of this category in [`Category::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = StreamError;

    /// Parses a wire name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| StreamError::UnknownCategory(s.to_string()))
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Dense table holding one `f64` per category.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CategoryValues([f64; Category::COUNT]);

impl CategoryValues {
    /// Every category set to the same value.
    pub fn splat(value: f64) -> Self {
        Self([value; Category::COUNT])
    }

    pub fn get(&self, category: Category) -> f64 {
        self.0[category.index()]
    }

    /// Pairs in [`Category::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        Category::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

impl Index<Category> for CategoryValues {
    type Output = f64;

    fn index(&self, category: Category) -> &f64 {
        &self.0[category.index()]
    }
}

impl IndexMut<Category> for CategoryValues {
    fn index_mut(&mut self, category: Category) -> &mut f64 {
        &mut self.0[category.index()]
    }
}

impl Serialize for CategoryValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Category::COUNT))?;
        for (category, value) in self.iter() {
            map.serialize_entry(category.as_str(), &value)?;
        }
        map.end()
    }
}
