//! Timestamp parsing for broker exports.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M:%S%.f %p",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

/// Parse a timestamp cell.
///
/// RFC 3339 strings carry their own offset; naive strings are read at
/// `offset`. Returns `None` for blank or unrecognized input.
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Fixed offset from whole hours; out-of-range values fall back to UTC.
pub fn offset_from_hours(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours.saturating_mul(3600)).unwrap_or_else(|| Utc.fix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn utc() -> FixedOffset {
        offset_from_hours(0)
    }

    #[test]
    fn rfc3339_keeps_its_offset() {
        let dt = parse_timestamp("2024-03-01T09:30:00-05:00", utc()).unwrap();
        assert_eq!(dt.hour(), 14);
    }

    #[test]
    fn naive_iso_with_millis() {
        let dt = parse_timestamp("2024-03-01 09:30:00.250", utc()).unwrap();
        assert_eq!(dt.nanosecond(), 250_000_000);
    }

    #[test]
    fn us_format_with_meridiem() {
        let dt = parse_timestamp("03/01/2024 01:15:07 PM", utc()).unwrap();
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (13, 15, 7));
    }

    #[test]
    fn naive_read_at_offset() {
        let dt = parse_timestamp("2024-03-01 09:30:00", offset_from_hours(-5)).unwrap();
        assert_eq!(dt.hour(), 14);
    }

    #[test]
    fn blank_and_garbage_are_none() {
        assert!(parse_timestamp("   ", utc()).is_none());
        assert!(parse_timestamp("yesterday", utc()).is_none());
    }

    #[test]
    fn absurd_offset_falls_back_to_utc() {
        assert_eq!(offset_from_hours(99), utc());
    }
}
