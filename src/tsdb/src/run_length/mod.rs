//! Run-length compressed time series stored as documents.
//!
//! Every document ([`TsItem`]) keeps the distinct value transitions of a
//! stretch of time together with how long each value was held. Writers
//! enqueue samples; a periodic background pass appends them to the latest
//! document.

mod collection;
mod item;
mod options;
mod series;

pub use collection::{MemoryCollection, RunCollection};
pub use item::TsItem;
pub use options::RunLengthOptions;
pub use series::{resample, RunLengthSeries};
