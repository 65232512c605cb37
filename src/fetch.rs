use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Page retrieval seam. The pipeline treats this as an external collaborator;
/// the file implementation lets tests drive the full pipeline from fixtures.
pub trait PageFetcher {
    fn fetch(&self, location: &str) -> Result<String>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    /// One GET, no retries. A non-2xx status or transport error is an error;
    /// the caller decides whether that is fatal.
    fn fetch(&self, location: &str) -> Result<String> {
        let response = self
            .client
            .get(location)
            .send()
            .with_context(|| format!("request to {location} failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("request to {location} failed with status {status}");
        }

        let body = response
            .text()
            .with_context(|| format!("failed to read body from {location}"))?;

        info!(url = %location, bytes = body.len(), "fetched page");
        Ok(body)
    }
}

pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl PageFetcher for FileFetcher {
    fn fetch(&self, location: &str) -> Result<String> {
        let path = {
            let candidate = PathBuf::from(location);
            if candidate.is_absolute() {
                candidate
            } else {
                self.root.join(candidate)
            }
        };
        let body = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read page file {}", path.display()))?;

        info!(file = %path.display(), bytes = body.len(), "loaded page file");
        Ok(body)
    }
}
