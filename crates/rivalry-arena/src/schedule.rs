//! Turning a match's display date and time into an instant.
//!
//! Creators enter `match_date` and `match_time` as display strings such as
//! `"17 Jan 2026"` and `"14:30"`. They are read as wall-clock time at a
//! configured UTC offset.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

const DATE_FORMATS: &[&str] = &["%d %b %Y", "%d %B %Y", "%Y-%m-%d", "%d/%m/%Y", "%b %d %Y", "%B %d %Y"];
const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"];

/// Parse the scheduled start. `None` if either part is unrecognised.
#[must_use]
pub fn parse_start(match_date: &str, match_time: &str, utc_offset_minutes: i32) -> Option<DateTime<Utc>> {
    let date = parse_date(match_date)?;
    let time = parse_time(match_time)?;
    let offset = FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?)?;
    NaiveDateTime::new(date, time)
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whether the scheduled start is strictly before `now`. Unparseable
/// schedules are never due.
#[must_use]
pub fn has_started(match_date: &str, match_time: &str, utc_offset_minutes: i32, now: DateTime<Utc>) -> bool {
    parse_start(match_date, match_time, utc_offset_minutes).is_some_and(|start| start < now)
}

fn normalise(raw: &str) -> String {
    raw.replace(',', " ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = normalise(raw);
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Some(dt.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&raw, fmt).ok())
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = normalise(raw).to_uppercase();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&raw, fmt).ok())
}
