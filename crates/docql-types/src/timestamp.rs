//! ISO-8601 timestamp parsing and formatting.
//!
//! The text forms accepted are the ones the document text form uses:
//! `2007T`, `2007-02T`, `2007-02-23`, `2007-02-23T`, and full date-times
//! with a mandatory offset (`Z` or `+hh:mm`), with or without seconds and
//! fractional seconds. Date-only forms resolve to midnight UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat};

/// Parse an ISO-8601 timestamp text. Returns `None` on any malformed input.
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();

    // Year / year-month / date forms, optionally terminated by `T`.
    if let Some(date) = parse_date_form(text) {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return at_utc(midnight);
    }

    // Full date-time. `Z` normalizes to an explicit zero offset.
    let normalized = if let Some(prefix) = text.strip_suffix(['Z', 'z']) {
        format!("{prefix}+00:00")
    } else {
        text.to_owned()
    };
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Some(dt);
        }
    }
    None
}

fn parse_date_form(text: &str) -> Option<NaiveDate> {
    let body = text.strip_suffix('T').unwrap_or(text);
    let had_t = body.len() != text.len();
    match body.len() {
        // `2007T` and `2007-02T` require the trailing `T`.
        4 if had_t => NaiveDate::parse_from_str(&format!("{body}-01-01"), "%Y-%m-%d").ok(),
        7 if had_t => NaiveDate::parse_from_str(&format!("{body}-01"), "%Y-%m-%d").ok(),
        10 => NaiveDate::parse_from_str(body, "%Y-%m-%d").ok(),
        _ => None,
    }
}

fn at_utc(ndt: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    let utc = FixedOffset::east_opt(0)?;
    ndt.and_local_timezone(utc).single()
}

/// Format a timestamp in the canonical text form.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
