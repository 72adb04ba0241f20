//! Fetching remote pages.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{KbError, Result};

const USER_AGENT: &str = concat!("kb-index/", env!("CARGO_PKG_VERSION"));

/// Retrieves the raw HTML behind a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// `reqwest`-backed fetcher with a hard timeout and no retry.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| KbError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| KbError::InvalidInput(format!("invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(KbError::InvalidInput(format!(
                "unsupported URL scheme '{}' in '{}'",
                parsed.scheme(),
                url
            )));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| KbError::Fetch(format!("failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KbError::Fetch(format!(
                "failed to fetch {}: HTTP {}",
                url, status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| KbError::Fetch(format!("failed to read body of {}: {}", url, e)))
    }
}
