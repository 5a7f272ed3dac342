//! Timestamp and duration text formats used by the protocol.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

/// Format a timestamp as RFC 3339 in UTC with a `Z` suffix, keeping only as
/// many fractional digits as needed (up to nanoseconds).
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an RFC 3339 timestamp (any offset) into UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Format a non-negative duration the way `google.protobuf.Duration` does in
/// JSON: seconds with an optional fraction and an `s` suffix ("5s", "1.5s").
///
/// Negative durations are rendered with a leading `-`; bounds never emit them.
pub fn format_duration(d: TimeDelta) -> String {
    let sign = if d < TimeDelta::zero() { "-" } else { "" };
    let d = d.abs();
    let secs = d.num_seconds();
    let nanos = d.subsec_nanos();
    if nanos == 0 {
        return format!("{sign}{secs}s");
    }
    let frac = format!("{nanos:09}");
    format!("{sign}{secs}.{}s", frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_timestamp_trims_fraction() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-02T03:04:05Z");

        let ts = ts + TimeDelta::milliseconds(120);
        assert_eq!(format_timestamp(&ts), "2024-01-02T03:04:05.120Z");
    }

    #[test]
    fn test_parse_timestamp_normalizes_offset() {
        let ts = parse_timestamp("2024-01-02T05:04:05+02:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-02T03:04:05Z");
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(TimeDelta::seconds(5)), "5s");
        assert_eq!(format_duration(TimeDelta::milliseconds(1500)), "1.5s");
        assert_eq!(format_duration(TimeDelta::nanoseconds(1)), "0.000000001s");
        assert_eq!(format_duration(TimeDelta::zero()), "0s");
    }
}
