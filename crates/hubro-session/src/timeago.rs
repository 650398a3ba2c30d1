//! Relative date labels ("3 weeks ago", "in 2 months").
//!
//! Day granularity only. Units are fixed lengths: a year is 365 days, a
//! month 30 days and a week 7 days. One day earlier reads "yesterday" but
//! one day ahead reads "in 1 day", not "tomorrow".

use chrono::{DateTime, Local, NaiveDate};

/// Unit lengths in days, largest first.
const UNITS: [(&str, i64); 4] = [("year", 365), ("month", 30), ("week", 7), ("day", 1)];

/// Format `date` relative to `today`.
///
/// Picks the largest unit strictly shorter than the distance and rounds
/// the distance to a whole number of that unit. Halves round up, so 45 days
/// ago is "1 month ago" while 45 days ahead is "in 2 months".
#[must_use]
pub fn format_relative(date: NaiveDate, today: NaiveDate) -> String {
    let days = (date - today).num_days();

    match days {
        0 => return "today".to_owned(),
        -1 => return "yesterday".to_owned(),
        _ => {}
    }

    let (unit, length) = UNITS
        .into_iter()
        .find(|(_, length)| *length < days.abs())
        .unwrap_or(("day", 1));

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let count = (days as f64 / length as f64 + 0.5).floor() as i64;
    let plural = if count.abs() == 1 { "" } else { "s" };

    if count < 0 {
        format!("{} {unit}{plural} ago", count.abs())
    } else {
        format!("in {count} {unit}{plural}")
    }
}

/// Parse a front matter date.
///
/// Accepts RFC 3339 timestamps (converted to the local calendar day) and
/// plain `YYYY-MM-DD` dates.
#[must_use]
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(input) {
        return Some(timestamp.with_timezone(&Local).date_naive());
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

/// Today's date in the local time zone.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Format `date` relative to the local calendar day.
#[must_use]
pub fn format_relative_now(date: NaiveDate) -> String {
    format_relative(date, today())
}
