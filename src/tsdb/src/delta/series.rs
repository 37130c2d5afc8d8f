use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::delta::{delta_of_delta_decode, delta_of_delta_encode, DeltaTCompress};
use crate::error::{Result, TsdbError};

/// ValueDeltaSeries groups occurrences by value. Offsets are whole seconds from
/// `start`, the instant of the first data point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueDeltaSeries {
    start: Option<DateTime<Utc>>,
    values: BTreeMap<String, DeltaTCompress>,
    compressed: bool,
}

impl ValueDeltaSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn get(&self, value: &str) -> Option<&DeltaTCompress> {
        self.values.get(value)
    }

    pub fn add_data_point(&mut self, timestamp: DateTime<Utc>, value: &str) {
        if self.compressed {
            self.decompress_time_deltas();
        }
        let start = *self.start.get_or_insert(timestamp);
        let offset = (timestamp - start).num_seconds();

        self.values
            .entry(value.to_string())
            .or_default()
            .add_timestamp(offset);
    }

    pub fn compress_time_deltas(&mut self) {
        if self.compressed {
            return;
        }
        for c in self.values.values_mut() {
            let encoded = delta_of_delta_encode(c.time_deltas());
            c.set_time_deltas(encoded);
        }
        self.compressed = true;
    }

    pub fn decompress_time_deltas(&mut self) {
        if !self.compressed {
            return;
        }
        for c in self.values.values_mut() {
            let decoded = delta_of_delta_decode(c.time_deltas());
            c.set_time_deltas(decoded);
        }
        self.compressed = false;
    }

    fn deltas<'a>(&self, c: &'a DeltaTCompress) -> Cow<'a, [i64]> {
        if self.compressed {
            Cow::Owned(delta_of_delta_decode(c.time_deltas()))
        } else {
            Cow::Borrowed(c.time_deltas())
        }
    }

    /// get_data_for_time_frame returns every occurrence within `[start, end]`
    /// ordered by instant.
    pub fn get_data_for_time_frame(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<(DateTime<Utc>, String)> {
        let series_start = match self.start {
            Some(s) => s,
            None => return vec![],
        };

        let mut result = vec![];
        for (value, c) in &self.values {
            let mut offset = c.origin();
            for delta in self.deltas(c).iter() {
                offset += delta;
                let ts = series_start + Duration::seconds(offset);
                if ts >= start && ts <= end {
                    result.push((ts, value.clone()));
                }
            }
        }
        result.sort_by_key(|(ts, _)| *ts);
        result
    }

    /// get_data_for_time_frame_with_interval samples the series every `step`
    /// from `start` to `end`. Numeric neighbours are interpolated linearly and
    /// rendered with two decimals, anything else carries the earlier value.
    pub fn get_data_for_time_frame_with_interval(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<(DateTime<Utc>, String)>> {
        if step <= Duration::zero() {
            return Err(TsdbError::InvalidArgument(format!(
                "interval step must be positive, got {}",
                step
            )));
        }

        let data = self.get_data_for_time_frame(start, end);
        let mut result = vec![];
        let mut current = start;
        while current <= end {
            let before = data.iter().rev().find(|(ts, _)| *ts <= current);
            let after = data.iter().find(|(ts, _)| *ts >= current);

            match (before, after) {
                (Some(b), Some(a)) if b.0 == a.0 => result.push(b.clone()),
                (Some(b), Some(a)) => {
                    let point = match (b.1.parse::<f64>(), a.1.parse::<f64>()) {
                        (Ok(bv), Ok(av)) => {
                            let frac = (current - b.0).num_milliseconds() as f64
                                / (a.0 - b.0).num_milliseconds() as f64;
                            format!("{:.2}", bv + (av - bv) * frac)
                        }
                        _ => b.1.clone(),
                    };
                    result.push((current, point));
                }
                (Some(b), None) => result.push((current, b.1.clone())),
                _ => {}
            }

            current += step;
        }
        Ok(result)
    }
}
