use std::fmt::{Display, Formatter};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::probe;

/// TypeTag names the runtime type of a [`Typed`] value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Bool,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    Char,
    Uuid,
    DateTime,
    Bytes,
    String,
    Object,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Long => "long",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::Decimal => "decimal",
            TypeTag::Char => "char",
            TypeTag::Uuid => "uuid",
            TypeTag::DateTime => "datetime",
            TypeTag::Bytes => "bytes",
            TypeTag::String => "string",
            TypeTag::Object => "object",
        }
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed is a value that can be written into a register slot. Each variant
/// has exactly one canonical string form, see [`Typed::to_string_value`].
#[derive(Debug, Clone, PartialEq)]
pub enum Typed {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    Char(char),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Bytes(Vec<u8>),
    String(String),
    Object(serde_json::Value),
}

impl Typed {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Typed::Bool(_) => TypeTag::Bool,
            Typed::Int(_) => TypeTag::Int,
            Typed::Long(_) => TypeTag::Long,
            Typed::Float(_) => TypeTag::Float,
            Typed::Double(_) => TypeTag::Double,
            Typed::Decimal(_) => TypeTag::Decimal,
            Typed::Char(_) => TypeTag::Char,
            Typed::Uuid(_) => TypeTag::Uuid,
            Typed::DateTime(_) => TypeTag::DateTime,
            Typed::Bytes(_) => TypeTag::Bytes,
            Typed::String(_) => TypeTag::String,
            Typed::Object(_) => TypeTag::Object,
        }
    }

    /// to_string_value renders the wire form stored in a register slot.
    pub fn to_string_value(&self) -> String {
        match self {
            Typed::Bool(v) => if *v { "true" } else { "false" }.to_string(),
            Typed::Int(v) => v.to_string(),
            Typed::Long(v) => v.to_string(),
            Typed::Float(v) => v.to_string(),
            Typed::Double(v) => v.to_string(),
            Typed::Decimal(v) => v.to_string(),
            Typed::Char(v) => v.to_string(),
            Typed::Uuid(v) => v.hyphenated().to_string(),
            Typed::DateTime(v) => v.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Typed::Bytes(v) => STANDARD.encode(v),
            Typed::String(v) => v.clone(),
            Typed::Object(v) => v.to_string(),
        }
    }

    /// parse reads a canonical string back as the given type.
    pub fn parse(tag: TypeTag, s: &str) -> Option<Typed> {
        let v = match tag {
            TypeTag::Bool => Typed::Bool(probe::parse_bool(s)?),
            TypeTag::Int => Typed::Int(s.trim().parse().ok()?),
            TypeTag::Long => Typed::Long(s.trim().parse().ok()?),
            TypeTag::Float => Typed::Float(s.trim().parse().ok()?),
            TypeTag::Double => Typed::Double(s.trim().parse().ok()?),
            TypeTag::Decimal => Typed::Decimal(Decimal::from_str(s.trim()).ok()?),
            TypeTag::Char => Typed::Char(probe::parse_char(s)?),
            TypeTag::Uuid => Typed::Uuid(Uuid::parse_str(s.trim()).ok()?),
            TypeTag::DateTime => Typed::DateTime(probe::parse_date_time(s)?),
            TypeTag::Bytes => Typed::Bytes(STANDARD.decode(s.trim()).ok()?),
            TypeTag::String => Typed::String(s.to_string()),
            TypeTag::Object => Typed::Object(probe::parse_object(s)?),
        };
        Some(v)
    }
}

macro_rules! impl_from_typed {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Typed {
                fn from(v: $ty) -> Self {
                    Typed::$variant(v)
                }
            }
        )*
    };
}

impl_from_typed! {
    bool => Bool,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    Decimal => Decimal,
    char => Char,
    Uuid => Uuid,
    DateTime<Utc> => DateTime,
    Vec<u8> => Bytes,
    String => String,
    serde_json::Value => Object,
}

impl From<&str> for Typed {
    fn from(v: &str) -> Self {
        Typed::String(v.to_string())
    }
}

impl From<&[u8]> for Typed {
    fn from(v: &[u8]) -> Self {
        Typed::Bytes(v.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use quickcheck::{quickcheck, TestResult};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::value::{TypeTag, Typed};

    fn round_trip(v: Typed) -> bool {
        let s = v.to_string_value();
        Typed::parse(v.type_tag(), &s) == Some(v)
    }

    #[test]
    fn test_canonical_forms() {
        assert_eq!(Typed::Bool(true).to_string_value(), "true");
        assert_eq!(Typed::Bool(false).to_string_value(), "false");
        assert_eq!(Typed::Int(-42).to_string_value(), "-42");
        assert_eq!(Typed::Double(2.5).to_string_value(), "2.5");
        assert_eq!(Typed::Char('x').to_string_value(), "x");
        assert_eq!(Typed::Bytes(b"hello".to_vec()).to_string_value(), "aGVsbG8=");
        assert_eq!(
            Typed::Decimal(Decimal::new(1050, 2)).to_string_value(),
            "10.50"
        );

        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(
            Typed::Uuid(id).to_string_value(),
            "67e55044-10b1-426f-9247-bb680e5fe0c8"
        );

        let t = Utc.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap();
        assert_eq!(Typed::DateTime(t).to_string_value(), "2023-04-05T06:07:08Z");

        let obj = serde_json::json!({"a": 1});
        assert_eq!(Typed::Object(obj).to_string_value(), r#"{"a":1}"#);
    }

    #[test]
    fn test_type_tag_display() {
        assert_eq!(TypeTag::DateTime.to_string(), "datetime");
        assert_eq!(Typed::from("s").type_tag(), TypeTag::String);
        assert_eq!(Typed::from(1_i64).type_tag(), TypeTag::Long);
    }

    #[test]
    fn test_date_time_round_trip() {
        let t = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert!(round_trip(Typed::DateTime(t)));
    }

    quickcheck! {
        fn prop_bool_round_trip(v: bool) -> bool {
            round_trip(Typed::Bool(v))
        }

        fn prop_int_round_trip(v: i32) -> bool {
            round_trip(Typed::Int(v))
        }

        fn prop_long_round_trip(v: i64) -> bool {
            round_trip(Typed::Long(v))
        }

        fn prop_double_round_trip(v: f64) -> TestResult {
            if v.is_nan() {
                return TestResult::discard();
            }
            TestResult::from_bool(round_trip(Typed::Double(v)))
        }

        fn prop_uuid_round_trip(hi: u64, lo: u64) -> bool {
            let id = Uuid::from_u128(((hi as u128) << 64) | lo as u128);
            round_trip(Typed::Uuid(id))
        }

        fn prop_bytes_round_trip(v: Vec<u8>) -> bool {
            round_trip(Typed::Bytes(v))
        }
    }
}
