use serde::Deserialize;

use crate::notify::DEFAULT_ERROR_CHANNEL_CAPACITY;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunLengthOptions {
    /// a document holding this many value transitions is closed
    pub max_run_values: usize,
    pub max_items_per_flush: usize,
    pub error_channel_capacity: usize,
}

impl Default for RunLengthOptions {
    fn default() -> Self {
        Self {
            max_run_values: 10_000,
            max_items_per_flush: 5000,
            error_channel_capacity: DEFAULT_ERROR_CHANNEL_CAPACITY,
        }
    }
}
