#[macro_use]
extern crate async_trait;

pub mod iterator;
pub mod point;
