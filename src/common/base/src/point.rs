use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// FieldValue is a single dynamically typed value held by a run-length series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// as_f64 returns the numeric view of integer and double values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::Null
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        Self::Double(v as f64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// SeriesSample is one point read back from a run-length series. `is_index`
/// marks the first sample of a run as opposed to samples synthesized to fill
/// the run's duration.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSample {
    pub value: FieldValue,
    pub timestamp: DateTime<Utc>,
    pub is_index: bool,
}

impl SeriesSample {
    pub fn new(value: FieldValue, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            timestamp,
            is_index: false,
        }
    }

    pub fn with_index(mut self, is_index: bool) -> Self {
        self.is_index = is_index;
        self
    }
}

/// EntitySample is one numeric point of one entity read back from a file series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntitySample {
    pub entity_id: i64,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl EntitySample {
    pub fn new(entity_id: i64, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            entity_id,
            value,
            timestamp,
        }
    }
}
