use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// ValueFlags is the option bit set of a value register.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ValueFlags(u8);

impl ValueFlags {
    pub const NONE: ValueFlags = ValueFlags(0);
    /// priority 8 is reserved for a manual operator and never persisted
    pub const ALLOW_MANUAL_OPERATOR: ValueFlags = ValueFlags(1);
    pub const TIME_SERIES: ValueFlags = ValueFlags(1 << 1);
    pub const BLOCK_CHAIN: ValueFlags = ValueFlags(1 << 2);
    pub const PASSWORD_VALUE: ValueFlags = ValueFlags(1 << 3);
    pub const LOG_CHANGE: ValueFlags = ValueFlags(1 << 4);

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_enabled(&self, flag: ValueFlags) -> bool {
        flag.0 != 0 && self.0 & flag.0 == flag.0
    }

    pub fn enable(&mut self, flag: ValueFlags) {
        self.0 |= flag.0;
    }

    pub fn disable(&mut self, flag: ValueFlags) {
        self.0 &= !flag.0;
    }

    pub fn set(&mut self, flag: ValueFlags, on: bool) {
        if on {
            self.enable(flag)
        } else {
            self.disable(flag)
        }
    }
}

impl BitOr for ValueFlags {
    type Output = ValueFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ValueFlags(self.0 | rhs.0)
    }
}
