//! Card discovery and field extraction from a parsed page.
//!
//! Candidate containers come from a configured CSS selector; each card needs
//! a link and a date match to survive. Cards with partial or ambiguous data
//! are skipped rather than guessed at.

use crate::config::SelectConfig;
use crate::datetext::match_date_text;
use crate::fetch::PageFetcher;
use crate::model::RawCard;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Compiled structural selectors. Which markup counts as a card is entirely
/// configuration, so retargeting another site never touches this module.
pub struct CardSelectors {
    card: Selector,
    link: Selector,
    title: Selector,
    description: Option<Selector>,
    year_hint_ancestor: Option<String>,
    year_hint_attr: Option<String>,
    pub detail_fallback: bool,
}

impl CardSelectors {
    pub fn compile(config: &SelectConfig) -> Result<Self> {
        Ok(Self {
            card: parse_selector(&config.card)?,
            link: parse_selector(&config.link)?,
            title: parse_selector(&config.title)?,
            description: config
                .description
                .as_deref()
                .map(parse_selector)
                .transpose()?,
            year_hint_ancestor: config.year_hint_ancestor.clone(),
            year_hint_attr: config.year_hint_attr.clone(),
            detail_fallback: config.detail_fallback,
        })
    }
}

fn parse_selector(text: &str) -> Result<Selector> {
    Selector::parse(text).map_err(|err| anyhow!("invalid selector {text}: {err:?}"))
}

#[derive(Debug, Default)]
pub struct ExtractOutcome {
    pub cards: Vec<RawCard>,
    pub seen: usize,
    pub skipped: usize,
}

/// Enumerate candidate containers in one page and pull a `RawCard` out of
/// each one that has a link and a recognizable date. `detail` is consulted
/// once per card, best-effort, when the card's own text has no date match.
pub fn extract_cards(
    html: &str,
    selectors: &CardSelectors,
    base_url: Option<&str>,
    detail: Option<&dyn PageFetcher>,
) -> ExtractOutcome {
    let document = Html::parse_document(html);
    let mut outcome = ExtractOutcome::default();

    for node in document.select(&selectors.card) {
        outcome.seen += 1;

        let Some(href) = first_attr(&node, &selectors.link, "href") else {
            debug!("card has no link; skipping");
            outcome.skipped += 1;
            continue;
        };
        let url = absolutize_url(base_url, href.trim());

        let title = first_text(&node, &selectors.title);

        let text = collapse_whitespace(&node.text().collect::<Vec<_>>().join(" "));
        let matched = match match_date_text(&text) {
            Some(matched) => Some(matched),
            None => detail_page_match(&url, selectors, detail),
        };
        let Some(matched) = matched else {
            debug!(url = %url, "no date pattern matched; skipping card");
            outcome.skipped += 1;
            continue;
        };

        let description = selectors
            .description
            .as_ref()
            .and_then(|sel| first_text(&node, sel));

        let year_hint = ancestor_year_hint(&node, selectors);

        outcome.cards.push(RawCard {
            url,
            title,
            description,
            matched,
            year_hint,
        });
    }

    outcome
}

fn detail_page_match(
    url: &str,
    selectors: &CardSelectors,
    detail: Option<&dyn PageFetcher>,
) -> Option<crate::model::DateTimeMatch> {
    if !selectors.detail_fallback {
        return None;
    }
    let fetcher = detail?;

    match fetcher.fetch(url) {
        Ok(body) => {
            let document = Html::parse_document(&body);
            let text =
                collapse_whitespace(&document.root_element().text().collect::<Vec<_>>().join(" "));
            match_date_text(&text)
        }
        Err(err) => {
            warn!(url = %url, error = %err, "detail page fetch failed; dropping card");
            None
        }
    }
}

fn first_text(node: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    node.select(selector).next().and_then(|el| {
        let text = collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "));
        (!text.is_empty()).then_some(text)
    })
}

fn first_attr(node: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    node.select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(ToString::to_string)
        .filter(|v| !v.trim().is_empty())
}

/// Walk up from the card looking for the configured ancestor class carrying
/// a machine-readable timestamp attribute; its year is the most reliable
/// signal for listings that span a year boundary.
fn ancestor_year_hint(node: &ElementRef<'_>, selectors: &CardSelectors) -> Option<i32> {
    let class = selectors.year_hint_ancestor.as_deref()?;
    let attr = selectors.year_hint_attr.as_deref()?;

    for ancestor in node.ancestors() {
        let Some(element) = ElementRef::wrap(ancestor) else {
            continue;
        };
        if !element.value().classes().any(|c| c == class) {
            continue;
        }
        if let Some(value) = element.value().attr(attr) {
            return parse_year_hint(value);
        }
    }

    None
}

fn parse_year_hint(value: &str) -> Option<i32> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.year());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.year());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.year());
    }

    let re = Regex::new(r"(19|20)\d{2}").expect("year hint regex must compile");
    re.find(trimmed).and_then(|m| m.as_str().parse().ok())
}

pub fn absolutize_url(base_url: Option<&str>, value: &str) -> String {
    if value.starts_with("http://") || value.starts_with("https://") {
        return value.to_string();
    }

    if let Some(base) = base_url
        && let Ok(base) = Url::parse(base)
        && let Ok(joined) = base.join(value)
    {
        return joined.to_string();
    }

    value.to_string()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
