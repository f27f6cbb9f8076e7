//! Database helper functions for safe type conversions.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Type;

/// Date column format
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date column, returning a rusqlite error on failure.
pub fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Parse an RFC3339 datetime string from database, returning a rusqlite error on failure.
pub fn parse_datetime(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Convert a stored hour column into `0..=23`.
pub fn parse_hour(value: i64) -> rusqlite::Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|h| *h < 24)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(1, value))
}

/// Parse an event timestamp as written by the producer.
///
/// Producers write local wall-clock ISO-8601 (`T` or space separated, with
/// optional fractional seconds). RFC 3339 values with an offset are kept at
/// the wall-clock time of their own offset.
#[must_use]
pub fn parse_event_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ts);
        }
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_local())
}

/// Lower bound for a string comparison on `events.timestamp`.
///
/// A space sorts below `T`, so `timestamp >= lower_bound(ts)` selects every
/// row at or after `ts` in either separator style (plus a few earlier
/// `T`-style rows of the same day, which the caller filters out after parsing).
#[must_use]
pub fn timestamp_lower_bound(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Upper bound counterpart of [`timestamp_lower_bound`].
#[must_use]
pub fn timestamp_upper_bound(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_timestamp_variants() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 5, 0)
            .unwrap();
        assert_eq!(parse_event_timestamp("2024-01-01T10:05:00"), Some(expected));
        assert_eq!(parse_event_timestamp("2024-01-01 10:05:00"), Some(expected));
        assert_eq!(parse_event_timestamp("2024-01-01T10:05"), Some(expected));
        assert_eq!(
            parse_event_timestamp("2024-01-01T10:05:00+02:00"),
            Some(expected)
        );
        assert_eq!(
            parse_event_timestamp("2024-01-01T10:05:00.250000").map(|t| t.date()),
            Some(expected.date())
        );
    }

    #[test]
    fn test_parse_event_timestamp_rejects_garbage() {
        assert_eq!(parse_event_timestamp("yesterday"), None);
        assert_eq!(parse_event_timestamp(""), None);
        assert_eq!(parse_event_timestamp("2024-13-01T10:00:00"), None);
    }

    #[test]
    fn test_lower_bound_covers_both_separators() {
        let since = parse_event_timestamp("2024-01-01T09:00:00").unwrap();
        let bound = timestamp_lower_bound(since);
        assert!("2024-01-01T09:00:00".to_string() >= bound);
        assert!("2024-01-01 09:00:00".to_string() >= bound);
        assert!("2024-01-01 08:59:59.999".to_string() < bound);
        assert!("2023-12-31T23:59:59".to_string() < bound);
    }

    #[test]
    fn test_parse_hour_range() {
        assert_eq!(parse_hour(0).unwrap(), 0);
        assert_eq!(parse_hour(23).unwrap(), 23);
        assert!(parse_hour(24).is_err());
        assert!(parse_hour(-1).is_err());
    }
}
