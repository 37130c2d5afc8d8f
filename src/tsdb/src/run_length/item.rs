use chrono::{DateTime, Duration, Utc};
use common_base::point::{FieldValue, SeriesSample};
use iotdb_utils::time::ms_between;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TsdbError};

/// TsItem is one run document. `values`, `run_duration_ms` and
/// `index_offset_ms` are parallel: entry `i` held `values[i]` from
/// `start_time + index_offset_ms[i]` for `run_duration_ms[i]` milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsItem {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub values: Vec<FieldValue>,
    pub run_duration_ms: Vec<u64>,
    pub index_offset_ms: Vec<u64>,
    pub last_timestamp: DateTime<Utc>,
}

impl TsItem {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time: DateTime::<Utc>::MIN_UTC,
            values: vec![],
            run_duration_ms: vec![],
            index_offset_ms: vec![],
            last_timestamp: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// len is the number of value transitions in the document.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// add records `value` at `timestamp`. Timestamps must not go backwards;
    /// equal timestamps are accepted.
    pub fn add(&mut self, value: FieldValue, timestamp: DateTime<Utc>) -> Result<()> {
        if timestamp < self.last_timestamp {
            return Err(TsdbError::OrderingViolation {
                timestamp,
                last: self.last_timestamp,
            });
        }

        let extends = self.values.last() == Some(&value);
        if self.values.is_empty() {
            self.start_time = timestamp;
        }

        if extends {
            let elapsed = ms_between(self.last_timestamp, timestamp);
            if let Some(duration) = self.run_duration_ms.last_mut() {
                *duration += elapsed;
            }
        } else {
            self.values.push(value);
            self.run_duration_ms.push(0);
            self.index_offset_ms
                .push(ms_between(self.start_time, timestamp));
        }

        self.last_timestamp = timestamp;
        Ok(())
    }

    /// expand yields one sample per millisecond held, the first sample of each
    /// entry marked as an index sample.
    pub fn expand(&self) -> Vec<SeriesSample> {
        let mut samples = vec![];
        for (i, value) in self.values.iter().enumerate() {
            let origin = self.start_time + Duration::milliseconds(self.index_offset_ms[i] as i64);
            for j in 0..=self.run_duration_ms[i] {
                let ts = origin + Duration::milliseconds(j as i64);
                samples.push(SeriesSample::new(value.clone(), ts).with_index(j == 0));
            }
        }
        samples
    }
}

impl Default for TsItem {
    fn default() -> Self {
        Self::new()
    }
}
