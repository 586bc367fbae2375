//! Strict parsing of the `published` field
//!
//! Records carry their publication time as text such as
//! `"January, 20 2017 03:51:25"`, always interpreted as UTC.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};

/// strftime layout of the `published` field
pub const PUBLISHED_FORMAT: &str = "%B, %d %Y %H:%M:%S";

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn invalid(input: &str, reason: impl Into<String>) -> CoreError {
    CoreError::InvalidDate {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Parse a `published` value into a UTC timestamp.
///
/// The month must be spelled out in full (chrono alone would also accept
/// abbreviations) and the rest must match [`PUBLISHED_FORMAT`] exactly.
pub fn parse_published(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid(input, "empty value"));
    }

    let (month, _) = trimmed
        .split_once(',')
        .ok_or_else(|| invalid(input, "missing ',' after month name"))?;
    if !MONTHS.iter().any(|m| m.eq_ignore_ascii_case(month)) {
        return Err(invalid(input, format!("unknown month name '{}'", month)));
    }

    let naive = NaiveDateTime::parse_from_str(trimmed, PUBLISHED_FORMAT)
        .map_err(|e| invalid(input, e.to_string()))?;

    Ok(naive.and_utc())
}

/// Calendar year (UTC) of a `published` value
pub fn published_year(input: &str) -> Result<i32> {
    parse_published(input).map(|dt| dt.year())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_published() {
        let dt = parse_published("January, 20 2017 03:51:25").unwrap();
        assert_eq!(dt.year(), 2017);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 20);
        assert_eq!(dt.hour(), 3);
        assert_eq!(dt.minute(), 51);
        assert_eq!(dt.second(), 25);
    }

    #[test]
    fn test_published_year() {
        assert_eq!(published_year("January, 01 2020 00:00:00").unwrap(), 2020);
        assert_eq!(published_year("December, 31 2016 23:59:59").unwrap(), 2016);
        assert_eq!(published_year("  September, 12 2018 10:00:00 ").unwrap(), 2018);
    }

    #[test]
    fn test_rejects_abbreviated_month() {
        assert!(parse_published("Jan, 20 2017 03:51:25").is_err());
    }

    #[test]
    fn test_rejects_malformed_values() {
        for input in [
            "",
            "   ",
            "2017-01-20T03:51:25Z",
            "January 20 2017 03:51:25",
            "January, 32 2017 03:51:25",
            "February, 30 2017 00:00:00",
            "January, 20 2017",
            "January, 20 2017 25:00:00",
            "not a date",
        ] {
            assert!(parse_published(input).is_err(), "accepted {:?}", input);
        }
    }

    #[test]
    fn test_error_names_input() {
        let err = parse_published("Smarch, 01 2020 00:00:00").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Smarch, 01 2020 00:00:00"));
        assert!(msg.contains("unknown month name"));
    }
}
