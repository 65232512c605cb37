//! Date/time pattern matching over loosely structured page text.
//!
//! Two patterns are tried in fixed priority order: a timed single-day range
//! ("Fri 2 Jan | 8:00 am - 9:00 am"), then an all-day multi-day range
//! ("Sat 3 Jan - Sat 24 Jan"). Only the first match in the text is used.

use crate::model::{DateTimeMatch, DayMonth};
use regex::Regex;
use std::sync::OnceLock;

const WEEKDAY: &str = r"(?:(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\s+)?";
const MONTH: &str = r"(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)";
const TIME: &str = r"(\d{1,2}:\d{2}\s*(?:am|pm))";

fn timed_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // day month [year] [|] start - end; dash may be hyphen or en-dash
        let pattern = format!(
            r"(?i)\b{WEEKDAY}(\d{{1,2}})\s+{MONTH}[a-z]*(?:\s+(\d{{4}}))?\s*(?:\|\s*)?{TIME}\s*[-–]\s*{TIME}"
        );
        Regex::new(&pattern).expect("timed pattern must compile")
    })
}

fn all_day_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?i)\b{WEEKDAY}(\d{{1,2}})\s+{MONTH}[a-z]*(?:\s+(\d{{4}}))?\s*[-–]\s*{WEEKDAY}(\d{{1,2}})\s+{MONTH}[a-z]*(?:\s+(\d{{4}}))?"
        );
        Regex::new(&pattern).expect("all-day pattern must compile")
    })
}

/// Attempt to recover a date/time structure from a raw text blob. Returns
/// `None` when neither pattern matches; callers must not guess a date.
pub fn match_date_text(text: &str) -> Option<DateTimeMatch> {
    if let Some(caps) = timed_pattern().captures(text) {
        let date = day_month(caps.get(1)?.as_str(), caps.get(2)?.as_str(), caps.get(3))?;
        return Some(DateTimeMatch::Timed {
            date,
            start: caps.get(4)?.as_str().to_string(),
            end: caps.get(5)?.as_str().to_string(),
        });
    }

    if let Some(caps) = all_day_pattern().captures(text) {
        let start = day_month(caps.get(1)?.as_str(), caps.get(2)?.as_str(), caps.get(3))?;
        let end = day_month(caps.get(4)?.as_str(), caps.get(5)?.as_str(), caps.get(6))?;
        return Some(DateTimeMatch::AllDay { start, end });
    }

    None
}

fn day_month(day: &str, month: &str, year: Option<regex::Match<'_>>) -> Option<DayMonth> {
    Some(DayMonth {
        day: day.parse().ok()?,
        month: month_number(month)?,
        year: year.and_then(|m| m.as_str().parse().ok()),
    })
}

/// Day-first reading: the numeric ordinal is always the day, the name the
/// month. Matches the abbreviated month prefix case-insensitively.
pub fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| lower.starts_with(m))
        .map(|idx| idx as u32 + 1)
}
