use chrono::format::StrftimeItems;
use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};

/// DAY_STAMP_FORMAT is the date layout embedded in per-day file names.
pub const DAY_STAMP_FORMAT: &str = "%Y%m%d";

/// current instant in UTC
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// normalizes an instant of any zone to UTC.
pub fn to_utc<Tz: TimeZone>(t: DateTime<Tz>) -> DateTime<Utc> {
    t.with_timezone(&Utc)
}

/// ms_between returns the whole milliseconds elapsed from `start` to `end`,
/// or 0 when `end` is before `start`.
pub fn ms_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let ms = end.signed_duration_since(start).num_milliseconds();
    if ms < 0 {
        0
    } else {
        ms as u64
    }
}

pub fn unix_millis_to_time(unix_millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(unix_millis).single()
}

pub fn time_format(dt: DateTime<Utc>) -> String {
    let fmt = StrftimeItems::new("%Y-%m-%d %H:%M:%S%.3f");
    format!("{}", dt.format_with_items(fmt))
}

/// day_stamp renders a date as `yyyyMMdd`.
pub fn day_stamp(date: NaiveDate) -> String {
    date.format(DAY_STAMP_FORMAT).to_string()
}

/// parse_day_stamp accepts exactly eight ASCII digits forming a valid `yyyyMMdd` date.
pub fn parse_day_stamp(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(s, DAY_STAMP_FORMAT).ok()
}

/// in_daily_window reports whether `t` falls in the first minute of `hour`.
pub fn in_daily_window<Tz: TimeZone>(t: &DateTime<Tz>, hour: u32) -> bool {
    t.hour() == hour && t.minute() < 1
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use crate::time::{day_stamp, in_daily_window, ms_between, parse_day_stamp};

    #[test]
    fn test_ms_between() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(ms_between(t0, t0 + Duration::milliseconds(1500)), 1500);
        assert_eq!(ms_between(t0 + Duration::seconds(1), t0), 0);
    }

    #[test]
    fn test_day_stamp() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert_eq!(day_stamp(d), "20240109");
        assert_eq!(parse_day_stamp("20240109"), Some(d));
        assert_eq!(parse_day_stamp("2024019"), None);
        assert_eq!(parse_day_stamp("b_202401"), None);
        assert_eq!(parse_day_stamp("20241301"), None);
    }

    #[test]
    fn test_in_daily_window() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 1, 0, 30).unwrap();
        assert!(in_daily_window(&t, 1));
        assert!(!in_daily_window(&(t + Duration::minutes(1)), 1));
        assert!(!in_daily_window(&t, 2));
    }
}
