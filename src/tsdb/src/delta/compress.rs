use serde::{Deserialize, Serialize};

/// DeltaTCompress records the occurrences of one value as deltas in seconds.
/// The first occurrence is always recorded as 0; its offset is kept as `origin`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaTCompress {
    time_deltas: Vec<i64>,
    origin: Option<i64>,
    last: Option<i64>,
}

impl DeltaTCompress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_timestamp(&mut self, t: i64) {
        let delta = match self.last {
            None => {
                self.origin = Some(t);
                0
            }
            Some(last) => t - last,
        };
        self.time_deltas.push(delta);
        self.last = Some(t);
    }

    /// origin is the offset of the first occurrence, 0 before any.
    pub fn origin(&self) -> i64 {
        self.origin.unwrap_or(0)
    }

    pub fn time_deltas(&self) -> &[i64] {
        &self.time_deltas
    }

    pub fn set_time_deltas(&mut self, deltas: Vec<i64>) {
        self.time_deltas = deltas;
    }

    pub fn len(&self) -> usize {
        self.time_deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_deltas.is_empty()
    }
}

/// delta_of_delta_encode keeps the first delta and replaces every following
/// delta with its difference from the previous one.
pub fn delta_of_delta_encode(deltas: &[i64]) -> Vec<i64> {
    let mut encoded = Vec::with_capacity(deltas.len());
    let mut previous = 0;
    for (i, delta) in deltas.iter().enumerate() {
        if i == 0 {
            encoded.push(*delta);
        } else {
            encoded.push(delta - previous);
        }
        previous = *delta;
    }
    encoded
}

/// delta_of_delta_decode is the cumulative sum inverse of [`delta_of_delta_encode`].
pub fn delta_of_delta_decode(encoded: &[i64]) -> Vec<i64> {
    let mut sum = 0;
    encoded
        .iter()
        .map(|d| {
            sum += d;
            sum
        })
        .collect()
}
