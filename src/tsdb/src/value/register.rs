use chrono::{DateTime, Utc};
use iotdb_utils::hash::sha256_hex;
use iotdb_utils::time::now_utc;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TsdbError};
use crate::value::probe;
use crate::value::{TypeTag, Typed, ValueFlags};

pub const PRIORITY_LEVELS: usize = 16;
pub const MANUAL_OPERATOR_PRIORITY: u8 = PriorityLevel::ManualOperator as u8;

const DEFAULT_UNIT: &str = "n/a";

/// PriorityLevel names the 16 slots of a priority array, highest first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PriorityLevel {
    ManualOperatorOverride = 1,
    CriticalEquipmentControl = 2,
    Available3 = 3,
    Available4 = 4,
    CriticalEquipmentControl2 = 5,
    MinimumOnOff = 6,
    Available7 = 7,
    ManualOperator = 8,
    Available9 = 9,
    Available10 = 10,
    Available11 = 11,
    Available12 = 12,
    Available13 = 13,
    Available14 = 14,
    Default = 15,
    DefaultFallback = 16,
}

impl PriorityLevel {
    pub fn priority(self) -> u8 {
        self as u8
    }
}

/// ValueRegister resolves the effective value of a data point from up to 16
/// prioritized writers. Slot `i` holds priority `i + 1`; the first occupied
/// slot wins.
///
/// A register has no internal locking. Share it behind a lock of your own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRegister {
    name: String,
    description: String,
    unit: String,
    flags: ValueFlags,
    strict_type: Option<TypeTag>,
    values: [Option<String>; PRIORITY_LEVELS],
    timestamps: [Option<DateTime<Utc>>; PRIORITY_LEVELS],
}

impl ValueRegister {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            unit: DEFAULT_UNIT.to_string(),
            flags: ValueFlags::ALLOW_MANUAL_OPERATOR,
            strict_type: None,
            values: Default::default(),
            timestamps: Default::default(),
        }
    }

    /// with_value builds a register whose initial value sits at the fallback
    /// priority 16. With `PASSWORD_VALUE` in `flags`, the value must be a string
    /// and is stored as its SHA-256 hash.
    pub fn with_value(
        name: impl Into<String>,
        description: impl Into<String>,
        value: Option<Typed>,
        flags: ValueFlags,
    ) -> Result<Self> {
        let mut register = Self::new(name, description);
        register.flags = flags;

        let fallback = PriorityLevel::DefaultFallback.priority();
        if flags.is_enabled(ValueFlags::PASSWORD_VALUE) {
            match value {
                Some(Typed::String(raw)) => {
                    register.set_password(fallback, Some(raw.as_str()))?;
                }
                other => {
                    return Err(TsdbError::InvalidArgument(format!(
                        "password value must be a string, got {}",
                        other.map(|v| v.type_tag().to_string()).unwrap_or_else(|| "none".to_string())
                    )));
                }
            }
        } else {
            register.set_at(fallback, value)?;
        }
        Ok(register)
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_strict_type(mut self, tag: TypeTag) -> Self {
        self.strict_type = Some(tag);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn strict_type(&self) -> Option<TypeTag> {
        self.strict_type
    }

    pub fn flags(&self) -> ValueFlags {
        self.flags
    }

    pub fn set_flag(&mut self, flag: ValueFlags, on: bool) {
        self.flags.set(flag, on);
    }

    pub fn allow_manual_operator(&self) -> bool {
        self.flags.is_enabled(ValueFlags::ALLOW_MANUAL_OPERATOR)
    }

    pub fn time_series(&self) -> bool {
        self.flags.is_enabled(ValueFlags::TIME_SERIES)
    }

    pub fn block_chain(&self) -> bool {
        self.flags.is_enabled(ValueFlags::BLOCK_CHAIN)
    }

    pub fn is_password(&self) -> bool {
        self.flags.is_enabled(ValueFlags::PASSWORD_VALUE)
    }

    pub fn values(&self) -> &[Option<String>; PRIORITY_LEVELS] {
        &self.values
    }

    pub fn timestamps(&self) -> &[Option<DateTime<Utc>>; PRIORITY_LEVELS] {
        &self.timestamps
    }

    /// set_at writes `value` into the slot of `priority`. Returns `Ok(false)`
    /// when the slot is the manual-operator slot under lockout; the slot is
    /// cleared in that case.
    pub fn set_at(&mut self, priority: u8, value: Option<Typed>) -> Result<bool> {
        let slot = slot_index(priority)?;
        if let (Some(expected), Some(v)) = (self.strict_type, value.as_ref()) {
            let actual = v.type_tag();
            if actual != expected {
                return Err(TsdbError::TypeMismatch { expected, actual });
            }
        }

        let payload = value.map(|v| v.to_string_value());
        Ok(self.write_slot(slot, payload))
    }

    pub fn set_level(&mut self, level: PriorityLevel, value: Option<Typed>) -> Result<bool> {
        self.set_at(level.priority(), value)
    }

    /// set_password stores the lowercase SHA-256 hex digest of `raw`. An absent
    /// or empty password clears the slot value.
    pub fn set_password(&mut self, priority: u8, raw: Option<&str>) -> Result<bool> {
        let slot = slot_index(priority)?;
        if let (Some(expected), Some(_)) = (self.strict_type, raw) {
            if expected != TypeTag::String {
                return Err(TsdbError::TypeMismatch {
                    expected,
                    actual: TypeTag::String,
                });
            }
        }

        self.flags.enable(ValueFlags::PASSWORD_VALUE);
        let payload = raw.filter(|r| !r.is_empty()).map(sha256_hex);
        Ok(self.write_slot(slot, payload))
    }

    pub fn set_object<T: Serialize>(&mut self, priority: u8, value: &T) -> Result<bool> {
        let json = serde_json::to_value(value)?;
        self.set_at(priority, Some(Typed::Object(json)))
    }

    fn write_slot(&mut self, slot: usize, payload: Option<String>) -> bool {
        if slot + 1 == MANUAL_OPERATOR_PRIORITY as usize && self.allow_manual_operator() {
            self.values[slot] = None;
            self.timestamps[slot] = None;
            debug!(name = %self.name, "manual operator slot is locked, write discarded");
            return false;
        }

        if self.flags.is_enabled(ValueFlags::LOG_CHANGE) {
            info!(
                name = %self.name,
                priority = slot + 1,
                value = payload.as_deref().unwrap_or("null"),
                "value changed"
            );
        }
        self.values[slot] = payload;
        self.timestamps[slot] = Some(now_utc());
        true
    }

    pub fn effective_value(&self) -> Option<&str> {
        self.values.iter().flatten().next().map(|s| s.as_str())
    }

    /// effective_priority is 1..=16, or 0 when every slot is empty.
    pub fn effective_priority(&self) -> u8 {
        self.values
            .iter()
            .position(|v| v.is_some())
            .map(|i| i as u8 + 1)
            .unwrap_or(0)
    }

    pub fn effective_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.iter().flatten().next().copied()
    }

    fn probe(&self, f: fn(&str) -> bool) -> bool {
        self.effective_value().map(f).unwrap_or(false)
    }

    fn parse_as(&self, tag: TypeTag) -> Option<Typed> {
        self.effective_value().and_then(|s| Typed::parse(tag, s))
    }

    pub fn is_guid(&self) -> bool {
        self.probe(probe::is_guid)
    }

    pub fn is_boolean(&self) -> bool {
        self.probe(probe::is_boolean)
    }

    pub fn is_date_time(&self) -> bool {
        self.probe(probe::is_date_time)
    }

    pub fn is_integer(&self) -> bool {
        self.probe(probe::is_integer)
    }

    pub fn is_long(&self) -> bool {
        self.probe(probe::is_long)
    }

    pub fn is_double(&self) -> bool {
        self.probe(probe::is_double)
    }

    pub fn is_float(&self) -> bool {
        self.probe(probe::is_float)
    }

    pub fn is_decimal(&self) -> bool {
        self.probe(probe::is_decimal)
    }

    pub fn is_char(&self) -> bool {
        self.probe(probe::is_char)
    }

    pub fn is_numeric(&self) -> bool {
        self.probe(probe::is_numeric)
    }

    pub fn is_hash(&self) -> bool {
        self.probe(probe::is_hash)
    }

    pub fn is_password_hash(&self) -> bool {
        self.is_hash()
    }

    pub fn is_object<T: DeserializeOwned>(&self) -> bool {
        self.as_object::<T>().is_some()
    }

    /// as_type reports the first type the effective value parses as, or `None`
    /// when there is no effective value.
    pub fn as_type(&self) -> Option<TypeTag> {
        self.effective_value().map(probe::detect_type)
    }

    pub fn as_boolean(&self) -> Option<bool> {
        self.effective_value().and_then(probe::parse_bool)
    }

    pub fn as_date_time(&self) -> Option<DateTime<Utc>> {
        self.effective_value().and_then(probe::parse_date_time)
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self.parse_as(TypeTag::Int)? {
            Typed::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self.parse_as(TypeTag::Long)? {
            Typed::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self.parse_as(TypeTag::Double)? {
            Typed::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self.parse_as(TypeTag::Float)? {
            Typed::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self.parse_as(TypeTag::Decimal)? {
            Typed::Decimal(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_guid(&self) -> Option<Uuid> {
        match self.parse_as(TypeTag::Uuid)? {
            Typed::Uuid(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        self.effective_value().and_then(probe::parse_char)
    }

    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match self.parse_as(TypeTag::Bytes)? {
            Typed::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        self.effective_value().map(|s| s.to_string())
    }

    pub fn as_object<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_str(self.effective_value()?).ok()
    }
}

fn slot_index(priority: u8) -> Result<usize> {
    if (1..=PRIORITY_LEVELS as u8).contains(&priority) {
        Ok(priority as usize - 1)
    } else {
        Err(TsdbError::InvalidPriority(priority))
    }
}
