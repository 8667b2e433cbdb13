use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cleaned course price
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Price {
    /// Finite, non-negative amount
    Amount(f64),

    /// Missing or unparseable in the source dataset
    Unknown,
}

impl Price {
    /// Amount, if known
    pub fn amount(&self) -> Option<f64> {
        match self {
            Self::Amount(value) => Some(*value),
            Self::Unknown => None,
        }
    }
}

impl From<Option<f64>> for Price {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() && v >= 0.0 => Self::Amount(v),
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amount(value) => write!(f, "{}", value),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One course, addressed by its row position in the dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Row position; equals the item's position in the index
    pub id: usize,

    pub title: String,

    pub offered_by: String,

    pub domain: String,

    /// Free-form (e.g. "40 Hours"), not parsed
    pub duration: String,

    pub price: Price,
}

impl Item {
    /// Text that gets embedded for this item
    ///
    /// Always four space-separated fields in fixed order; missing fields are
    /// empty strings so the layout never shifts.
    pub fn descriptor(&self) -> String {
        format!(
            "{} {} {} {}",
            self.title, self.offered_by, self.domain, self.duration
        )
    }
}

/// Raw search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Item id
    pub id: usize,

    /// Squared Euclidean distance to the query
    pub distance: f32,
}

/// Recommended item with its cosine similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub item: Item,

    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Identity of a built index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Embedding dimension
    pub dimension: usize,

    /// Number of items
    pub count: usize,

    /// Embedding provider model id
    pub model_id: String,

    /// SHA-256 of the dataset the index was built from
    pub dataset_fingerprint: String,

    /// Build time (millisecond precision)
    pub built_at: DateTime<Utc>,
}
