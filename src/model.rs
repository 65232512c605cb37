use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A day-of-month plus month number, with a year only when the source text
/// carried one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayMonth {
    pub day: u32,
    pub month: u32,
    pub year: Option<i32>,
}

/// Result of running the date/time patterns over a card's text blob.
/// Exactly one shape is produced per match: a timed single-day range or an
/// all-day multi-day range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateTimeMatch {
    Timed {
        date: DayMonth,
        start: String,
        end: String,
    },
    AllDay {
        start: DayMonth,
        end: DayMonth,
    },
}

/// Transient extraction unit: one candidate container that produced a date
/// match. Discarded once the normalizer has derived an `EventRecord` from it.
#[derive(Debug, Clone)]
pub struct RawCard {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub matched: DateTimeMatch,
    /// Year recovered from an ancestor timestamp attribute, when present.
    pub year_hint: Option<i32>,
}

/// Event timing. All-day ranges keep the inclusive end date the source text
/// expressed; the ICS writer converts to an exclusive DTEND.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventTime {
    Timed {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    AllDay {
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl EventTime {
    /// Canonical start value used for both the stable UID and the dedup key.
    pub fn start_key(&self) -> String {
        match self {
            EventTime::Timed { start, .. } => start.to_rfc3339(),
            EventTime::AllDay { start, .. } => start.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub uid: String,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub time: EventTime,
}

/// The assembled calendar. Insertion order is preserved; duplicates by
/// (title, start, url) are dropped, first occurrence wins.
#[derive(Debug, Clone)]
pub struct Feed {
    pub name: String,
    pub timezone: String,
    pub prodid: String,
    pub generated_at: DateTime<Utc>,
    pub events: Vec<EventRecord>,
    seen: HashSet<(String, String, String)>,
}

impl Feed {
    pub fn new(name: &str, timezone: &str, prodid: &str, generated_at: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            timezone: timezone.to_string(),
            prodid: prodid.to_string(),
            generated_at,
            events: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Returns false (and drops the event) if an event with the same
    /// (title, start, url) key was inserted earlier.
    pub fn insert(&mut self, event: EventRecord) -> bool {
        let key = (
            event.title.clone(),
            event.time.start_key(),
            event.url.clone(),
        );
        if !self.seen.insert(key) {
            return false;
        }
        self.events.push(event);
        true
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub pages_fetched: usize,
    pub cards_seen: usize,
    pub cards_skipped: usize,
    pub duplicates: usize,
    pub events_written: usize,
    pub bytes_written: u64,
    pub output_path: String,
}
