//! ICS (RFC 5545) rendering. This is the bit-exact compatibility surface:
//! CRLF line endings, 75-octet folding, escaped text values.

use crate::model::{EventRecord, EventTime, Feed};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use std::path::Path;

pub fn write_feed(feed: &Feed, path: &Path) -> Result<u64> {
    let body = render_feed(feed);

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output dir {}", parent.display()))?;
    }

    std::fs::write(path, body.as_bytes())
        .with_context(|| format!("failed to write ics {}", path.display()))?;

    Ok(body.len() as u64)
}

pub fn render_feed(feed: &Feed) -> String {
    let mut lines = Vec::new();
    push_line(&mut lines, "BEGIN:VCALENDAR".to_string());
    push_line(&mut lines, "VERSION:2.0".to_string());
    push_line(&mut lines, format!("PRODID:{}", escape_text(&feed.prodid)));
    push_line(&mut lines, "CALSCALE:GREGORIAN".to_string());
    push_line(&mut lines, "METHOD:PUBLISH".to_string());
    push_line(
        &mut lines,
        format!("X-WR-CALNAME:{}", escape_text(&feed.name)),
    );
    push_line(
        &mut lines,
        format!("X-WR-TIMEZONE:{}", escape_text(&feed.timezone)),
    );

    for event in &feed.events {
        append_event_lines(&mut lines, event, feed.generated_at);
    }

    push_line(&mut lines, "END:VCALENDAR".to_string());
    lines.join("\r\n") + "\r\n"
}

fn append_event_lines(lines: &mut Vec<String>, event: &EventRecord, generated_at: DateTime<Utc>) {
    push_line(lines, "BEGIN:VEVENT".to_string());
    push_line(lines, format!("UID:{}", escape_text(&event.uid)));
    push_line(lines, format!("DTSTAMP:{}", format_utc(generated_at)));

    match &event.time {
        EventTime::Timed { start, end } => {
            push_line(lines, format!("DTSTART:{}", format_utc(*start)));
            push_line(lines, format!("DTEND:{}", format_utc(*end)));
        }
        EventTime::AllDay { start, end } => {
            // the model holds the inclusive end date; DTEND is exclusive
            push_line(lines, format!("DTSTART;VALUE=DATE:{}", format_date(*start)));
            let exclusive_end = end.succ_opt().unwrap_or(*end);
            push_line(
                lines,
                format!("DTEND;VALUE=DATE:{}", format_date(exclusive_end)),
            );
        }
    }

    push_line(lines, format!("SUMMARY:{}", escape_text(&event.title)));
    push_line(lines, format!("URL:{}", escape_text(&event.url)));

    if let Some(description) = &event.description {
        push_line(lines, format!("DESCRIPTION:{}", escape_text(description)));
    }
    if let Some(category) = &event.category {
        push_line(lines, format!("CATEGORIES:{}", escape_text(category)));
    }

    push_line(lines, "END:VEVENT".to_string());
}

fn push_line(lines: &mut Vec<String>, line: String) {
    for folded in fold_line(&line) {
        lines.push(folded);
    }
}

fn fold_line(line: &str) -> Vec<String> {
    const LIMIT: usize = 75;

    if line.len() <= LIMIT {
        return vec![line.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for ch in line.chars() {
        if current.len() + ch.len_utf8() > LIMIT {
            if chunks.is_empty() {
                chunks.push(current.clone());
            } else {
                chunks.push(format!(" {current}"));
            }
            current.clear();
        }
        current.push(ch);
    }

    if !current.is_empty() {
        if chunks.is_empty() {
            chunks.push(current);
        } else {
            chunks.push(format!(" {current}"));
        }
    }

    chunks
}

fn format_utc(value: DateTime<Utc>) -> String {
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        value.year(),
        value.month(),
        value.day(),
        value.hour(),
        value.minute(),
        value.second()
    )
}

fn format_date(value: NaiveDate) -> String {
    format!("{:04}{:02}{:02}", value.year(), value.month(), value.day())
}

fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}
