use anyhow::{Context, Result, anyhow, bail};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// A feed configuration plus the path it was loaded from (none when the
/// built-in defaults are in use).
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: Option<PathBuf>,
    pub config: FeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub feed: FeedMeta,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub select: SelectConfig,
    #[serde(default = "default_pages")]
    pub pages: Vec<PageConfig>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            feed: FeedMeta::default(),
            fetch: FetchConfig::default(),
            select: SelectConfig::default(),
            pages: default_pages(),
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.feed.name.trim().is_empty() {
            bail!("feed.name must not be empty");
        }
        if self.pages.is_empty() {
            bail!("at least one [[pages]] entry is required");
        }

        self.timezone()?;

        match self.fetch.mode {
            FetchMode::Http => {
                if self.fetch.base_url.is_none() {
                    bail!("fetch.base_url is required for http mode");
                }
                for page in &self.pages {
                    if page.url.is_none() {
                        bail!("every page needs a url in http mode");
                    }
                }
            }
            FetchMode::File => {
                for page in &self.pages {
                    if page.file.is_none() {
                        bail!("every page needs a file in file mode");
                    }
                }
            }
        }

        if self.select.card.trim().is_empty()
            || self.select.link.trim().is_empty()
            || self.select.title.trim().is_empty()
        {
            bail!("select.card, select.link and select.title must not be empty");
        }

        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.feed
            .timezone
            .parse::<Tz>()
            .map_err(|_| anyhow!("unknown time zone {}", self.feed.timezone))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedMeta {
    #[serde(default = "default_feed_name")]
    pub name: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_prodid")]
    pub prodid: String,
    #[serde(default = "default_uid_domain")]
    pub uid_domain: String,
    #[serde(default = "default_out_path")]
    pub out_path: PathBuf,
}

impl Default for FeedMeta {
    fn default() -> Self {
        Self {
            name: default_feed_name(),
            timezone: default_timezone(),
            prodid: default_prodid(),
            uid_domain: default_uid_domain(),
            out_path: default_out_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    #[default]
    Http,
    File,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default)]
    pub mode: FetchMode,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::Http,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Structural selectors for locating event cards and their fields. The
/// defaults target the server-rendered "What's On" listing markup.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectConfig {
    #[serde(default = "default_card_selector")]
    pub card: String,
    #[serde(default = "default_link_selector")]
    pub link: String,
    #[serde(default = "default_title_selector")]
    pub title: String,
    #[serde(default = "default_description_selector")]
    pub description: Option<String>,
    /// Ancestor class carrying a machine-readable end timestamp; its year
    /// overrides the current-year fallback.
    #[serde(default = "default_year_hint_ancestor")]
    pub year_hint_ancestor: Option<String>,
    #[serde(default = "default_year_hint_attr")]
    pub year_hint_attr: Option<String>,
    /// When a card's own text yields no date match, fetch the event's page
    /// and try again before dropping the card.
    #[serde(default)]
    pub detail_fallback: bool,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            card: default_card_selector(),
            link: default_link_selector(),
            title: default_title_selector(),
            description: default_description_selector(),
            year_hint_ancestor: default_year_hint_ancestor(),
            year_hint_attr: default_year_hint_attr(),
            detail_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub category: Option<String>,
}

pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let Some(path) = path else {
        let config = FeedConfig::default();
        config.validate().context("built-in default config invalid")?;
        return Ok(LoadedConfig { path: None, config });
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: FeedConfig = toml::from_str(&text)
        .with_context(|| format!("failed to parse toml in {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;

    Ok(LoadedConfig {
        path: Some(path.to_path_buf()),
        config,
    })
}

fn default_feed_name() -> String {
    "London Buddhist Centre".to_string()
}

fn default_timezone() -> String {
    "Europe/London".to_string()
}

fn default_prodid() -> String {
    "-//wics//Events Feed 1.0//EN".to_string()
}

fn default_uid_domain() -> String {
    "wics.local".to_string()
}

fn default_out_path() -> PathBuf {
    PathBuf::from("docs/events.ics")
}

fn default_base_url() -> Option<String> {
    Some("https://www.londonbuddhistcentre.com".to_string())
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; wics/0.1; +https://github.com/wics/wics)".to_string()
}

fn default_card_selector() -> String {
    "div.w-layout-grid.whatson-events".to_string()
}

fn default_link_selector() -> String {
    r#"a[fs-list-element="item-link"]"#.to_string()
}

fn default_title_selector() -> String {
    r#"h4[fs-list-field="keyword"]"#.to_string()
}

fn default_description_selector() -> Option<String> {
    Some(".whats-on-content .text-size-small".to_string())
}

fn default_year_hint_ancestor() -> Option<String> {
    Some("w-dyn-item".to_string())
}

fn default_year_hint_attr() -> Option<String> {
    Some("data-end-time".to_string())
}

fn default_pages() -> Vec<PageConfig> {
    ["Meditation", "Buddhism", "Retreats", "Yoga", "Courses", "Online"]
        .into_iter()
        .map(|tag| PageConfig {
            url: Some(format!("/whats-on?tags-event={tag}")),
            file: None,
            category: Some(tag.to_string()),
        })
        .collect()
}
