use anyhow::Result;
use icalendar::{Calendar, Component};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use wics::harness::{HarnessOptions, run_harness};
use wics::pipeline::{BuildOptions, ValidateOptions, build_feed, validate_config};

const PAGE_ONE: &str = r#"<html><body>
<div class="listing-item" data-end-time="2025-01-02T09:00:00">
  <div class="event-card">
    <a class="more" href="/events/morning-meditation">More info</a>
    <h4 class="title">Morning Meditation</h4>
    <p class="blurb">Start the day well.</p>
    <span>Fri 2 Jan | 8:00 am - 9:00 am</span>
  </div>
</div>
<div class="listing-item" data-end-time="2025-01-24T00:00:00">
  <div class="event-card">
    <a class="more" href="/events/winter-retreat">More info</a>
    <h4 class="title">Winter Retreat</h4>
    <span>Sat 3 Jan - Sat 24 Jan</span>
  </div>
</div>
<div class="event-card">
  <h4 class="title">No Link Card</h4>
  <span>5 Jan | 1:00 pm - 2:00 pm</span>
</div>
<div class="event-card">
  <a class="more" href="/events/mystery">More info</a>
  <h4 class="title">Mystery Event</h4>
  <span>Details on the event page</span>
</div>
</body></html>"#;

const PAGE_TWO: &str = r#"<html><body>
<div class="listing-item" data-end-time="2025-01-02T09:00:00">
  <div class="event-card">
    <a class="more" href="/events/morning-meditation">More info</a>
    <h4 class="title">Morning Meditation</h4>
    <span>Fri 2 Jan | 8:00 am - 9:00 am</span>
  </div>
</div>
<div class="listing-item" data-end-time="2025-02-07T19:30:00">
  <div class="event-card">
    <a class="more" href="/events/evening-yoga">More info</a>
    <h4 class="title">Evening Yoga</h4>
    <span>Fri 7 Feb | 6:00 pm - 7:30 pm</span>
  </div>
</div>
</body></html>"#;

struct FixtureEnv {
    _temp: tempfile::TempDir,
    config_path: PathBuf,
    out_path: PathBuf,
}

fn write_config(root: &Path, pages: &[(&str, &str)], detail_fallback: bool) -> Result<PathBuf> {
    let out_path = root.join("out/events.ics");
    let mut config = format!(
        r#"[feed]
name = "Test Events"
timezone = "Europe/London"
uid_domain = "test.local"
out_path = "{}"

[fetch]
mode = "file"

[select]
card = "div.event-card"
link = "a.more"
title = "h4.title"
description = "p.blurb"
year_hint_ancestor = "listing-item"
year_hint_attr = "data-end-time"
detail_fallback = {detail_fallback}
"#,
        out_path.display()
    );

    for (file, category) in pages {
        config.push_str(&format!(
            "\n[[pages]]\nfile = \"{file}\"\ncategory = \"{category}\"\n"
        ));
    }

    let config_path = root.join("feed.toml");
    fs::write(&config_path, config)?;
    Ok(config_path)
}

fn setup_fixture_env() -> Result<FixtureEnv> {
    let temp = tempdir()?;
    let root = temp.path().to_path_buf();

    fs::write(root.join("page1.html"), PAGE_ONE)?;
    fs::write(root.join("page2.html"), PAGE_TWO)?;
    let config_path = write_config(
        &root,
        &[("page1.html", "Meditation"), ("page2.html", "Online")],
        false,
    )?;

    Ok(FixtureEnv {
        out_path: root.join("out/events.ics"),
        _temp: temp,
        config_path,
    })
}

#[test]
fn build_extracts_dedups_and_writes_calendar() -> Result<()> {
    let env = setup_fixture_env()?;

    let report = build_feed(&BuildOptions {
        config_path: Some(env.config_path.clone()),
        out_path: None,
    })?;

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.cards_seen, 6);
    assert_eq!(report.events_written, 3);
    assert_eq!(report.duplicates, 1);
    // one card without a link, one whose text never matches a date
    assert_eq!(report.cards_skipped, 2);
    assert!(report.bytes_written > 0);

    let content = fs::read_to_string(&env.out_path)?;
    assert!(content.contains("X-WR-CALNAME:Test Events"));
    assert!(content.contains("X-WR-TIMEZONE:Europe/London"));
    assert!(content.contains("SUMMARY:Morning Meditation"));
    // 8:00 am London in January is 08:00 UTC
    assert!(content.contains("DTSTART:20250102T080000Z"));
    assert!(content.contains("DTEND:20250102T090000Z"));
    // all-day range: inclusive 24 Jan becomes an exclusive DTEND of 25 Jan
    assert!(content.contains("DTSTART;VALUE=DATE:20250103"));
    assert!(content.contains("DTEND;VALUE=DATE:20250125"));
    assert!(content.contains("CATEGORIES:Meditation"));
    assert!(content.contains("DESCRIPTION:Start the day well."));
    assert!(content.ends_with("\r\n"));

    Ok(())
}

#[test]
fn feed_round_trips_through_a_standard_ics_reader() -> Result<()> {
    let env = setup_fixture_env()?;
    build_feed(&BuildOptions {
        config_path: Some(env.config_path.clone()),
        out_path: None,
    })?;

    let content = fs::read_to_string(&env.out_path)?;
    let calendar: Calendar = content.parse().expect("output must parse as ICS");

    let mut seen = Vec::new();
    for component in &calendar.components {
        let icalendar::CalendarComponent::Event(event) = component else {
            continue;
        };
        seen.push((
            event.property_value("SUMMARY").unwrap_or_default().to_string(),
            event.property_value("UID").unwrap_or_default().to_string(),
            event.property_value("URL").unwrap_or_default().to_string(),
            event.property_value("DTSTART").unwrap_or_default().to_string(),
        ));
    }

    assert_eq!(seen.len(), 3);
    let summaries: Vec<&str> = seen.iter().map(|(s, ..)| s.as_str()).collect();
    assert!(summaries.contains(&"Morning Meditation"));
    assert!(summaries.contains(&"Winter Retreat"));
    assert!(summaries.contains(&"Evening Yoga"));

    for (_, uid, url, dtstart) in &seen {
        assert!(uid.ends_with("@test.local"));
        assert!(url.starts_with("/events/"));
        assert!(!dtstart.is_empty());
    }

    Ok(())
}

#[test]
fn escapes_and_folds_text_for_calendar_readers() -> Result<()> {
    let temp = tempdir()?;
    let root = temp.path();

    let long_blurb = "A slow, steady sequence for every body; expect standing poses, \
         twists and a guided relaxation to finish, with plenty of variations offered \
         throughout the class and no experience needed.";
    let page = format!(
        r#"<html><body>
<div class="listing-item" data-end-time="2025-06-06T19:30:00">
  <div class="event-card">
    <a class="more" href="/events/yoga-stretch">More info</a>
    <h4 class="title">Yoga, stretch; relax</h4>
    <p class="blurb">{long_blurb}</p>
    <span>Fri 6 Jun | 6:00 pm - 7:30 pm</span>
  </div>
</div>
</body></html>"#
    );
    fs::write(root.join("page.html"), page)?;
    let config_path = write_config(root, &[("page.html", "Yoga")], false)?;

    build_feed(&BuildOptions {
        config_path: Some(config_path),
        out_path: None,
    })?;

    let content = fs::read_to_string(root.join("out/events.ics"))?;
    assert!(content.contains(r"SUMMARY:Yoga\, stretch\; relax"));
    assert!(content.contains(r"DESCRIPTION:A slow\, steady sequence"));
    // 75-octet content limit, plus the single leading space on continuations
    assert!(content.lines().all(|line| line.len() <= 76));
    assert!(content.lines().any(|line| line.starts_with(' ')));

    let calendar: Calendar = content.parse().expect("escaped output must parse as ICS");
    let events: Vec<_> = calendar
        .components
        .iter()
        .filter_map(|component| match component {
            icalendar::CalendarComponent::Event(event) => Some(event),
            _ => None,
        })
        .collect();
    assert_eq!(events.len(), 1);
    assert!(
        events[0]
            .property_value("SUMMARY")
            .unwrap_or_default()
            .contains("Yoga")
    );

    Ok(())
}

#[test]
fn page_paths_join_against_the_base_origin() {
    use wics::extract::absolutize_url;

    let base = Some("https://www.example.org");
    assert_eq!(
        absolutize_url(base, "whats-on?tags-event=Yoga"),
        "https://www.example.org/whats-on?tags-event=Yoga"
    );
    assert_eq!(
        absolutize_url(base, "/whats-on?tags-event=Yoga"),
        "https://www.example.org/whats-on?tags-event=Yoga"
    );
    assert_eq!(
        absolutize_url(base, "https://other.example.org/whats-on"),
        "https://other.example.org/whats-on"
    );
}

#[test]
fn zero_matched_cards_still_writes_an_empty_feed() -> Result<()> {
    let temp = tempdir()?;
    let root = temp.path();

    fs::write(root.join("empty.html"), "<html><body><p>Nothing on.</p></body></html>")?;
    let config_path = write_config(root, &[("empty.html", "Meditation")], false)?;

    let report = build_feed(&BuildOptions {
        config_path: Some(config_path),
        out_path: None,
    })?;

    assert_eq!(report.events_written, 0);

    let content = fs::read_to_string(root.join("out/events.ics"))?;
    assert!(content.contains("BEGIN:VCALENDAR"));
    assert!(content.contains("END:VCALENDAR"));
    assert!(!content.contains("BEGIN:VEVENT"));

    Ok(())
}

#[test]
fn missing_source_page_aborts_without_output() -> Result<()> {
    let temp = tempdir()?;
    let root = temp.path();

    let config_path = write_config(root, &[("absent.html", "Meditation")], false)?;

    let result = build_feed(&BuildOptions {
        config_path: Some(config_path),
        out_path: None,
    });

    assert!(result.is_err());
    assert!(!root.join("out/events.ics").exists());

    Ok(())
}

#[test]
fn detail_page_fallback_recovers_a_dateless_card() -> Result<()> {
    let temp = tempdir()?;
    let root = temp.path();

    fs::write(
        root.join("listing.html"),
        r#"<html><body>
<div class="listing-item" data-end-time="2025-03-10T12:00:00">
  <div class="event-card">
    <a class="more" href="detail.html">More info</a>
    <h4 class="title">Spring Workshop</h4>
    <span>Details on the event page</span>
  </div>
</div>
</body></html>"#,
    )?;
    fs::write(
        root.join("detail.html"),
        r#"<html><body>
<h1>Spring Workshop</h1>
<p>Wed 10 Mar | 11:00 am - 12:00 pm</p>
</body></html>"#,
    )?;
    let config_path = write_config(root, &[("listing.html", "Courses")], true)?;

    let report = build_feed(&BuildOptions {
        config_path: Some(config_path),
        out_path: None,
    })?;

    assert_eq!(report.events_written, 1);
    let content = fs::read_to_string(root.join("out/events.ics"))?;
    assert!(content.contains("SUMMARY:Spring Workshop"));
    assert!(content.contains("DTSTART:20250310T110000Z"));

    Ok(())
}

#[test]
fn harness_reports_stable_identifiers() -> Result<()> {
    let env = setup_fixture_env()?;

    let report = run_harness(&HarnessOptions {
        config_path: Some(env.config_path.clone()),
        out_dir: env.out_path.parent().unwrap().join("harness"),
    })?;

    assert_eq!(report.first_run_events, 3);
    assert_eq!(report.second_run_events, 3);
    assert!(report.uids_stable);

    Ok(())
}

#[test]
fn validate_accepts_fixture_config_and_builtin_defaults() -> Result<()> {
    let env = setup_fixture_env()?;

    let messages = validate_config(&ValidateOptions {
        config_path: Some(env.config_path.clone()),
    })?;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("OK: Test Events"));

    let messages = validate_config(&ValidateOptions { config_path: None })?;
    assert!(messages[0].contains("builtin defaults"));

    Ok(())
}
