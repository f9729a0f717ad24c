use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Parse a tracker timestamp. Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]`
/// (with or without `T`, taken as UTC) and bare dates (midnight UTC).
/// Anything else yields `None`.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite/Postgres text dumps: "2024-01-02 10:00:00+00"
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Fractional days from `start` to `end` (negative if `end` is earlier).
pub fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// Round to a fixed number of decimal places, halves to even.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// ISO `YYYY-WW` key for the week containing `d`.
pub fn year_week_key(d: NaiveDate) -> String {
    let iso_week = d.iso_week();
    format!("{}-{:02}", iso_week.year(), iso_week.week())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = utc(2024, 1, 2, 10);
        assert_eq!(parse_timestamp("2024-01-02T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T13:00:00+03:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 10:00:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 10:00:00+00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02"), Some(utc(2024, 1, 2, 0)));
    }

    #[test]
    fn test_parse_timestamp_malformed() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-45"), None);
    }

    #[test]
    fn test_days_between() {
        assert_eq!(days_between(utc(2024, 1, 1, 0), utc(2024, 1, 10, 0)), 9.0);
        assert_eq!(days_between(utc(2024, 1, 1, 0), utc(2024, 1, 1, 12)), 0.5);
        assert_eq!(days_between(utc(2024, 1, 2, 0), utc(2024, 1, 1, 0)), -1.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(8.0, 2), 8.0);
    }

    #[test]
    fn test_round_to_halves_to_even() {
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(-0.125, 2), -0.12);
    }

    #[test]
    fn test_year_week_key() {
        assert_eq!(year_week_key(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), "2024-01");
        // ISO week 1 of 2025 starts on 2024-12-30
        assert_eq!(year_week_key(NaiveDate::from_ymd_opt(2024, 12, 30).unwrap()), "2025-01");
        assert_eq!(year_week_key(NaiveDate::from_ymd_opt(2021, 1, 3).unwrap()), "2020-53");
    }
}
