//! Flat per-day record files with a write-behind queue.
//!
//! Records of a series named `cpu` land in `{base}/cpu_{yyyyMMdd}.tea`, one
//! file per UTC day. Day files older than yesterday are merged nightly into
//! the archive `{base}/data/cpu.tea`.

mod file;
mod options;
mod record;
mod store;

pub use file::{read_items, write_items, TeaFileReader};
pub use options::FileSeriesOptions;
pub use record::{TeaFileHeader, TeaItem, TEA_FILE_HEADER_SIZE, TEA_ITEM_SIZE};
pub use store::{ConsolidationStats, FileSeriesStore};
