//! Timestamp parsing for the loosely formatted dates the API returns.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};

pub const DISPLAY_FORMAT: &str = "%d %b, %Y %H:%M";

/// Accepts RFC 3339, ISO 8601 with a colon-less offset (`+0000`) and naive
/// `YYYY-MM-DD HH:MM:SS` (taken as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive).fixed_offset());
        }
    }
    None
}

pub fn format_in<Tz: TimeZone>(parsed: DateTime<FixedOffset>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    parsed.with_timezone(tz).format(DISPLAY_FORMAT).to_string()
}

/// Local-time rendering; falls back to the raw text when it does not parse.
pub fn format_local(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(parsed) => format_in(parsed, &Local),
        None => raw.to_string(),
    }
}
