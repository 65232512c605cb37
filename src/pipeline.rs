//! Feed assembly: one linear pass over the configured source pages.

use crate::config::{FetchMode, LoadedConfig, PageConfig, load_config};
use crate::extract::{CardSelectors, absolutize_url, extract_cards};
use crate::fetch::{FileFetcher, HttpFetcher, PageFetcher};
use crate::ics::write_feed;
use crate::model::{Feed, RunReport};
use crate::normalize::normalize_card;
use anyhow::{Context, Result, bail};
use chrono::{Datelike, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub config_path: Option<PathBuf>,
    pub out_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    pub config_path: Option<PathBuf>,
}

/// Fetch every configured page, extract and normalize its cards, dedup, and
/// write the calendar file. Any page fetch failure aborts the run with no
/// output written; zero extracted events still writes a well-formed feed.
pub fn build_feed(options: &BuildOptions) -> Result<RunReport> {
    let loaded = load_config(options.config_path.as_deref())?;
    let config = &loaded.config;

    let tz = config.timezone()?;
    let selectors = CardSelectors::compile(&config.select)?;
    let fetcher = make_fetcher(&loaded)?;
    let detail = selectors
        .detail_fallback
        .then_some(fetcher.as_ref() as &dyn PageFetcher);

    // Listings rarely carry a year; assume the current one in the feed zone.
    let now = Utc::now();
    let fallback_year = now.with_timezone(&tz).year();

    let mut feed = Feed::new(
        &config.feed.name,
        &config.feed.timezone,
        &config.feed.prodid,
        now,
    );
    let mut report = RunReport::default();

    for page in &config.pages {
        let location = page_location(&loaded, page)?;
        let html = fetcher
            .fetch(&location)
            .with_context(|| format!("fetch failed for source page {location}"))?;
        report.pages_fetched += 1;

        let outcome = extract_cards(&html, &selectors, config.fetch.base_url.as_deref(), detail);
        report.cards_seen += outcome.seen;
        report.cards_skipped += outcome.skipped;

        for card in outcome.cards {
            let url = card.url.clone();
            match normalize_card(
                card,
                page.category.as_deref(),
                tz,
                fallback_year,
                &config.feed.uid_domain,
            ) {
                Ok(event) => {
                    if feed.insert(event) {
                        report.events_written += 1;
                    } else {
                        report.duplicates += 1;
                    }
                }
                Err(err) => {
                    warn!(url = %url, error = %err, "card rejected during normalization");
                    report.cards_skipped += 1;
                }
            }
        }

        info!(
            page = %location,
            cards = outcome.seen,
            events = report.events_written,
            "page processed"
        );
    }

    if feed.events.is_empty() {
        warn!("no events extracted from any source page; writing empty feed");
    }

    let out_path = options
        .out_path
        .clone()
        .unwrap_or_else(|| config.feed.out_path.clone());
    report.bytes_written = write_feed(&feed, &out_path)?;
    report.output_path = out_path.display().to_string();

    info!(
        events = report.events_written,
        duplicates = report.duplicates,
        skipped = report.cards_skipped,
        bytes = report.bytes_written,
        file = %out_path.display(),
        "feed written"
    );

    Ok(report)
}

pub fn validate_config(options: &ValidateOptions) -> Result<Vec<String>> {
    let loaded = load_config(options.config_path.as_deref())?;

    // validate() ran during load; also compile the parts it cannot see
    CardSelectors::compile(&loaded.config.select)?;
    loaded.config.timezone()?;

    let origin = loaded
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "builtin defaults".to_string());

    Ok(vec![format!(
        "OK: {} ({origin}, {} pages)",
        loaded.config.feed.name,
        loaded.config.pages.len()
    )])
}

fn make_fetcher(loaded: &LoadedConfig) -> Result<Box<dyn PageFetcher>> {
    match loaded.config.fetch.mode {
        FetchMode::Http => Ok(Box::new(HttpFetcher::new(
            loaded.config.fetch.timeout_secs,
            &loaded.config.fetch.user_agent,
        )?)),
        FetchMode::File => {
            let root = loaded
                .path
                .as_ref()
                .and_then(|p| p.parent())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            Ok(Box::new(FileFetcher::new(root)))
        }
    }
}

fn page_location(loaded: &LoadedConfig, page: &PageConfig) -> Result<String> {
    match loaded.config.fetch.mode {
        FetchMode::Http => {
            let url = page.url.as_deref().context("page url missing")?;
            Ok(absolutize_url(loaded.config.fetch.base_url.as_deref(), url))
        }
        FetchMode::File => {
            // the FileFetcher resolves relative paths against the config dir
            let Some(file) = page.file.as_ref() else {
                bail!("page file missing");
            };
            Ok(file.display().to_string())
        }
    }
}
