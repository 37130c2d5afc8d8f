mod flags;
pub mod probe;
mod register;
mod typed;

pub use flags::ValueFlags;
pub use register::{PriorityLevel, ValueRegister, MANUAL_OPERATOR_PRIORITY, PRIORITY_LEVELS};
pub use typed::{TypeTag, Typed};
