use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CrawlConfig;

const BASE_BACKOFF_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },
    #[error("renderer returned no content for {url}")]
    EmptyDocument { url: String },
}

/// Supplies rendered documents to the crawler, which never touches the
/// network directly.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Renders pages through spider.cloud. Transient failures are retried with
/// backoff; once the renderer gives up, a plain GET is tried as last resort
/// for pages that turn out not to need JavaScript.
pub struct SpiderFetcher {
    spider: Spider,
    client: reqwest::Client,
    settle: Duration,
    timeout: Duration,
    retries: u32,
}

impl SpiderFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let api_key = std::env::var("SPIDER_API_KEY")
            .context("SPIDER_API_KEY environment variable must be set")?;
        let spider = Spider::new(Some(api_key))
            .map_err(|e| anyhow::anyhow!("Failed to create Spider client: {}", e))?;
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_millis(config.wait.timeout_ms))
            .build()
            .context("building fallback http client")?;

        Ok(Self {
            spider,
            client,
            settle: Duration::from_millis(config.wait.settle_ms),
            timeout: Duration::from_millis(config.wait.timeout_ms),
            retries: config.retries,
        })
    }

    async fn render(&self, url: &str) -> Result<String, FetchError> {
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
            ..Default::default()
        };

        let response = self
            .spider
            .scrape_url(url, Some(params), "application/json")
            .await
            .map_err(|e| FetchError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let parsed: serde_json::Value = match response.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
            None => response,
        };
        let first = parsed.as_array().and_then(|arr| arr.first());

        if let Some(status) = first.and_then(|obj| obj.get("status")).and_then(|s| s.as_i64()) {
            if status >= 400 {
                return Err(FetchError::Navigation {
                    url: url.to_string(),
                    reason: format!("status {status}"),
                });
            }
        }

        first
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .filter(|c| !c.trim().is_empty())
            .map(|c| c.to_string())
            .ok_or_else(|| FetchError::EmptyDocument { url: url.to_string() })
    }

    async fn render_bounded(&self, url: &str) -> Result<String, FetchError> {
        match tokio::time::timeout(self.timeout, self.render(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    async fn fetch_static(&self, url: &str) -> Result<String, FetchError> {
        let navigation = |e: reqwest::Error| FetchError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let body = self
            .client
            .get(url)
            .send()
            .await
            .map_err(navigation)?
            .error_for_status()
            .map_err(navigation)?
            .text()
            .await
            .map_err(navigation)?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyDocument { url: url.to_string() });
        }
        Ok(body)
    }
}

fn transient(err: &FetchError) -> bool {
    match err {
        FetchError::Timeout { .. } => true,
        FetchError::Navigation { reason, .. } => {
            reason.contains("429")
                || reason.contains("rate")
                || reason.contains("500")
                || reason.contains("502")
                || reason.contains("503")
        }
        FetchError::EmptyDocument { .. } => false,
    }
}

#[async_trait]
impl PageFetcher for SpiderFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0u32;
        let render_err = loop {
            match self.render_bounded(url).await {
                Ok(html) => {
                    tokio::time::sleep(self.settle).await;
                    return Ok(html);
                }
                Err(e) if transient(&e) && attempt < self.retries => {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "Transient failure on {} (attempt {}/{}), backing off {:.1}s",
                        url,
                        attempt + 1,
                        self.retries,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => break e,
            }
        };

        debug!("Renderer gave up on {}: {}, trying plain GET", url, render_err);
        match self.fetch_static(url).await {
            Ok(html) => {
                tokio::time::sleep(self.settle).await;
                Ok(html)
            }
            Err(_) => Err(render_err),
        }
    }
}
