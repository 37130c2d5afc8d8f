//! Probes that check whether a canonical string parses as a given type.
//! None of them fail; an unparsable input simply reports `false`.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::value::TypeTag;

lazy_static! {
    static ref HASH_RE: Regex = Regex::new("^[a-fA-F0-9]{64}$").unwrap();
}

pub fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

pub fn parse_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// parse_date_time accepts RFC 3339 and naive ISO-8601 forms, the latter read as UTC.
pub fn parse_date_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(t.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

/// parse_object only accepts JSON objects and arrays; bare JSON scalars are not objects.
pub fn parse_object(s: &str) -> Option<serde_json::Value> {
    match serde_json::from_str::<serde_json::Value>(s) {
        Ok(v @ serde_json::Value::Object(_)) | Ok(v @ serde_json::Value::Array(_)) => Some(v),
        _ => None,
    }
}

pub fn is_guid(s: &str) -> bool {
    Uuid::parse_str(s.trim()).is_ok()
}

pub fn is_boolean(s: &str) -> bool {
    parse_bool(s).is_some()
}

pub fn is_date_time(s: &str) -> bool {
    parse_date_time(s).is_some()
}

pub fn is_integer(s: &str) -> bool {
    s.trim().parse::<i32>().is_ok()
}

pub fn is_long(s: &str) -> bool {
    s.trim().parse::<i64>().is_ok()
}

pub fn is_double(s: &str) -> bool {
    s.trim().parse::<f64>().is_ok()
}

pub fn is_float(s: &str) -> bool {
    s.trim().parse::<f32>().is_ok()
}

pub fn is_decimal(s: &str) -> bool {
    Decimal::from_str(s.trim()).is_ok()
}

pub fn is_char(s: &str) -> bool {
    parse_char(s).is_some()
}

pub fn is_numeric(s: &str) -> bool {
    is_double(s)
}

pub fn is_hash(s: &str) -> bool {
    HASH_RE.is_match(s)
}

pub fn is_object(s: &str) -> bool {
    parse_object(s).is_some()
}

/// detect_type returns the first type `s` parses as, in the fixed order
/// uuid, bool, datetime, int, long, double, float, decimal, char, object, string.
pub fn detect_type(s: &str) -> TypeTag {
    let probes: [(fn(&str) -> bool, TypeTag); 10] = [
        (is_guid, TypeTag::Uuid),
        (is_boolean, TypeTag::Bool),
        (is_date_time, TypeTag::DateTime),
        (is_integer, TypeTag::Int),
        (is_long, TypeTag::Long),
        (is_double, TypeTag::Double),
        (is_float, TypeTag::Float),
        (is_decimal, TypeTag::Decimal),
        (is_char, TypeTag::Char),
        (is_object, TypeTag::Object),
    ];

    probes
        .iter()
        .find(|(probe, _)| probe(s))
        .map(|(_, tag)| *tag)
        .unwrap_or(TypeTag::String)
}

#[cfg(test)]
mod tests {
    use crate::value::probe::*;
    use crate::value::TypeTag;

    #[test]
    fn test_hash() {
        let hash = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        assert!(is_hash(hash));
        assert!(is_hash(&hash.to_uppercase()));
        assert!(!is_hash(&hash[1..]));
        assert!(!is_hash(&format!("{}0", hash)));
        assert!(!is_hash(&hash.replace('a', "g")));
    }

    #[test]
    fn test_probes() {
        assert!(is_boolean("True"));
        assert!(!is_boolean("yes"));
        assert!(is_integer("123"));
        assert!(!is_integer("3000000000"));
        assert!(is_long("3000000000"));
        assert!(is_double("1.25"));
        assert!(is_numeric("-7"));
        assert!(!is_numeric("abc"));
        assert!(is_decimal("10.50"));
        assert!(is_char("z"));
        assert!(!is_char("zz"));
        assert!(is_date_time("2023-04-05T06:07:08Z"));
        assert!(is_date_time("2023-04-05T06:07:08.5"));
        assert!(is_date_time("2023-04-05"));
        assert!(is_guid("67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert!(is_object(r#"{"a":[1,2]}"#));
        assert!(!is_object("\"text\""));
    }

    #[test]
    fn test_detect_type_order() {
        assert_eq!(detect_type("67e55044-10b1-426f-9247-bb680e5fe0c8"), TypeTag::Uuid);
        assert_eq!(detect_type("false"), TypeTag::Bool);
        assert_eq!(detect_type("2023-04-05T06:07:08Z"), TypeTag::DateTime);
        assert_eq!(detect_type("5"), TypeTag::Int);
        assert_eq!(detect_type("3000000000"), TypeTag::Long);
        assert_eq!(detect_type("2.5"), TypeTag::Double);
        assert_eq!(detect_type("q"), TypeTag::Char);
        assert_eq!(detect_type("[1,2]"), TypeTag::Object);
        assert_eq!(detect_type("hello world"), TypeTag::String);
    }
}
