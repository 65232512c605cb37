//! Turns a matched card into a typed, timezone-aware event record.

use crate::model::{DateTimeMatch, DayMonth, EventRecord, EventTime, RawCard};
use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use sha2::{Digest, Sha256};

/// Cards that matched a date but carried no usable heading keep minimal
/// calendar visibility under this title instead of being dropped.
pub const PLACEHOLDER_TITLE: &str = "Untitled event";

/// Year precedence: explicit year in the matched text, then the ancestor
/// timestamp hint, then the current year in the feed's zone (listings are
/// assumed to describe the current year).
pub fn normalize_card(
    card: RawCard,
    category: Option<&str>,
    tz: Tz,
    fallback_year: i32,
    uid_domain: &str,
) -> Result<EventRecord> {
    let time = match &card.matched {
        DateTimeMatch::Timed { date, start, end } => {
            let day = resolve_date(date, card.year_hint, fallback_year)?;
            let start = localize(day.and_time(parse_clock(start)?), tz)?;
            let end = localize(day.and_time(parse_clock(end)?), tz)?;
            if start > end {
                bail!("start {start} is after end {end}");
            }
            EventTime::Timed { start, end }
        }
        DateTimeMatch::AllDay { start, end } => {
            let start_date = resolve_date(start, card.year_hint, fallback_year)?;
            let mut end_date = resolve_date(end, card.year_hint, fallback_year)?;
            // "20 Dec - 3 Jan" carries no year on either side; an end month
            // earlier than the start month means the range crosses into the
            // next year.
            if end_date < start_date && end.year.is_none() && end.month < start.month {
                end_date = resolve_date(end, None, start_date.year() + 1)?;
            }
            if start_date > end_date {
                bail!("all-day start {start_date} is after end {end_date}");
            }
            // end stays inclusive, exactly as the source text expressed it
            EventTime::AllDay {
                start: start_date,
                end: end_date,
            }
        }
    };

    let title = card
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string());

    let uid = stable_uid(&card.url, &time, uid_domain);

    Ok(EventRecord {
        uid,
        title,
        url: card.url,
        description: card.description,
        category: category.map(ToString::to_string),
        time,
    })
}

fn resolve_date(dm: &DayMonth, year_hint: Option<i32>, fallback_year: i32) -> Result<NaiveDate> {
    let year = dm.year.or(year_hint).unwrap_or(fallback_year);
    NaiveDate::from_ymd_opt(year, dm.month, dm.day)
        .ok_or_else(|| anyhow!("invalid calendar date {}-{}-{}", year, dm.month, dm.day))
}

fn parse_clock(raw: &str) -> Result<NaiveTime> {
    let compact = raw.split_whitespace().collect::<String>().to_ascii_uppercase();
    NaiveTime::parse_from_str(&compact, "%I:%M%p")
        .with_context(|| format!("unparseable time of day {raw}"))
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&naive).latest())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("local time {naive} does not exist in {tz}"))
}

/// Deterministic digest over url + start instant: the same logical event
/// yields the same identifier across independent runs.
pub fn stable_uid(url: &str, time: &EventTime, uid_domain: &str) -> String {
    let digest = Sha256::digest(format!("{url}|{}", time.start_key()).as_bytes());
    format!("{}@{uid_domain}", &hex::encode(digest)[..24])
}
