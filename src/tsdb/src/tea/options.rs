use std::time::Duration;

use serde::Deserialize;

use crate::notify::DEFAULT_ERROR_CHANNEL_CAPACITY;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileSeriesOptions {
    /// create the base directory on open instead of failing
    pub create_dir_if_missing: bool,
    /// how often the flush task looks at the queue
    pub poll_interval: Duration,
    pub max_items_per_flush: usize,
    pub consolidation_check_interval: Duration,
    /// local hour whose first minute triggers consolidation
    pub consolidation_hour: u32,
    pub consolidate_on_startup: bool,
    pub error_channel_capacity: usize,
}

impl Default for FileSeriesOptions {
    fn default() -> Self {
        Self {
            create_dir_if_missing: false,
            poll_interval: Duration::from_millis(10),
            max_items_per_flush: 5000,
            consolidation_check_interval: Duration::from_secs(60),
            consolidation_hour: 1,
            consolidate_on_startup: true,
            error_channel_capacity: DEFAULT_ERROR_CHANNEL_CAPACITY,
        }
    }
}
