#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate tracing;

pub mod delta;
pub mod error;
pub mod notify;
pub mod run_length;
pub mod task;
pub mod tea;
pub mod value;

pub use error::{Result, TsdbError};
