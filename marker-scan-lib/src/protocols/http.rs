//! HTTP page fetcher.
//!
//! This module performs the single GET request behind every scan attempt and
//! reports whether the marker occurs in the retrieved body. Failures are
//! returned as part of the outcome, never raised, so one bad host cannot
//! abort a run.

use crate::error::ScanError;
use crate::types::{FetchOutcome, ScanConfig};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Performs one fetch of a URL and looks for a marker in the body.
///
/// Implementations make exactly one attempt per call; retry policy belongs to
/// the scan coordinator.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and report whether `marker` occurs in the body.
    async fn fetch(&self, url: &str, marker: &str) -> FetchOutcome;
}

/// `reqwest`-backed fetcher used for real scans.
///
/// One client (and its connection pool) is shared by every concurrent scan.
#[derive(Clone)]
pub struct HttpFetcher {
    /// HTTP client for page requests
    http_client: reqwest::Client,
    /// Timeout applied to the whole request, body included
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a new fetcher with default settings.
    pub fn new() -> Result<Self, ScanError> {
        Self::with_config(&ScanConfig::default())
    }

    /// Create a fetcher using the timeout and user agent from `config`.
    pub fn with_config(config: &ScanConfig) -> Result<Self, ScanError> {
        Self::with_timeout(config.request_timeout, &config.user_agent)
    }

    /// Create a fetcher with a custom timeout and user agent.
    pub fn with_timeout(timeout: Duration, user_agent: &str) -> Result<Self, ScanError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                ScanError::internal(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            timeout,
        })
    }

    /// Request timeout this fetcher was built with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_page(&self, url: &str, marker: &str) -> Result<bool, ScanError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ScanError::from_reqwest(url, &e, self.timeout))?;

        let status = response.status();
        debug!(url, status = status.as_u16(), "received response");

        if status != StatusCode::OK {
            return Err(ScanError::non_ok_status(url, status.as_u16()));
        }

        // The client timeout also bounds the body read.
        let body = response
            .bytes()
            .await
            .map_err(|e| ScanError::from_reqwest(url, &e, self.timeout))?;

        Ok(contains_marker(&body, marker))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, marker: &str) -> FetchOutcome {
        match self.fetch_page(url, marker).await {
            Ok(matched) => FetchOutcome::completed(matched),
            Err(e) => {
                debug!(url, error = %e, "fetch failed");
                FetchOutcome::failed(e)
            }
        }
    }
}

/// Byte-wise substring search of `marker` in `body`.
///
/// An empty marker matches every body.
pub fn contains_marker(body: &[u8], marker: &str) -> bool {
    let needle = marker.as_bytes();
    if needle.is_empty() {
        return true;
    }
    body.windows(needle.len()).any(|window| window == needle)
}
