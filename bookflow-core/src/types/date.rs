//! Date normalization
//!
//! Sources spell dates in many ways (`2021`, `2021-03`, RFC 3339, Calibre's
//! `2021-03-04 05:06:07+00:00`). Everything is brought to one canonical
//! form so records compare and sort the same whatever their origin.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Canonical date format for all records
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%:z"];

/// Normalize a date string to [`DATE_FORMAT`], converting offsets to UTC.
///
/// Returns `None` for empty or unparseable input.
pub fn normalize_date(input: &str) -> Option<String> {
    parse_date(input).map(|dt| dt.format(DATE_FORMAT).to_string())
}

/// Parse a date string in any of the accepted representations
pub fn parse_date(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(input, format) {
            return Some(dt.with_timezone(&Utc).naive_utc());
        }
    }
    // A trailing Z without an offset parser match, e.g. "2020-01-01T10:00Z"
    let stripped = input.strip_suffix('Z').unwrap_or(input);
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(stripped, format) {
            return Some(dt);
        }
    }

    let date_only = stripped.split(['T', ' ']).next().unwrap_or(stripped);
    if let Ok(date) = NaiveDate::parse_from_str(date_only, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", date_only), "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if date_only.len() == 4 && date_only.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = date_only.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0);
    }

    None
}
