//! Per-value timestamp delta compression.
//!
//! A [`ValueDeltaSeries`] keeps, for every distinct value observed, the list of
//! second deltas between successive occurrences of that value. The lists can
//! further be reduced with a delta-of-delta transform which pays off when the
//! sampling interval is regular.

mod compress;
mod series;

pub use compress::{delta_of_delta_decode, delta_of_delta_encode, DeltaTCompress};
pub use series::ValueDeltaSeries;
