//! Scan coordinator.
//!
//! This module provides the [`Scanner`], which resolves one target at a time
//! through the HTTP then HTTPS fallback, and drives many targets concurrently
//! through the shared pacing and pause controller.

use crate::backoff::Backoff;
use crate::error::ScanError;
use crate::protocols::{HttpFetcher, PageFetcher};
use crate::report::{Aggregator, ResultSink};
use crate::types::{FetchOutcome, Protocol, ScanConfig, ScanReport, ScanResult, Target};
use crate::utils::{build_url, validate_domain};
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use tokio::time::Instant;
use tracing::debug;

/// Coordinates marker scans over a list of targets.
///
/// The scanner owns the page fetcher and the [`Backoff`] controller; every
/// request it makes goes through one permit from that controller.
///
/// # Example
///
/// ```rust,no_run
/// use marker_scan_lib::{Scanner, ScanConfig, Target};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let scanner = Scanner::with_config(ScanConfig::default())?;
///     let result = scanner.scan(Target::from_domain("example.com")).await;
///     println!("{}: found={} over {}", result.target.domain, result.found, result.protocol);
///     Ok(())
/// }
/// ```
pub struct Scanner<F: PageFetcher = HttpFetcher> {
    /// Configuration settings for this scanner
    config: ScanConfig,
    /// Fetcher used for every attempt
    fetcher: F,
    /// Shared pacing and pause controller
    backoff: Backoff,
}

impl Scanner<HttpFetcher> {
    /// Create a scanner with default configuration.
    pub fn new() -> Result<Self, ScanError> {
        Self::with_config(ScanConfig::default())
    }

    /// Create a scanner backed by a real HTTP client.
    ///
    /// Fails if the configuration is invalid or the client cannot be built.
    pub fn with_config(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let fetcher = HttpFetcher::with_config(&config)?;
        Ok(Self::with_fetcher(config, fetcher))
    }
}

impl<F: PageFetcher> Scanner<F> {
    /// Create a scanner around any [`PageFetcher`].
    pub fn with_fetcher(config: ScanConfig, fetcher: F) -> Self {
        let backoff = Backoff::from_config(&config);
        Self {
            config,
            fetcher,
            backoff,
        }
    }

    /// Get the current configuration for this scanner.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// The pacing and pause controller shared by all scans.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Number of global pauses executed so far.
    pub fn pause_cycles(&self) -> u64 {
        self.backoff.pause_cycles()
    }

    /// Scan a single target.
    ///
    /// The checking process:
    /// 1. Validates the domain; an unusable domain is returned as an error
    ///    result without making any request
    /// 2. Fetches `http://<domain>`; a match ends the scan
    /// 3. Otherwise fetches `https://<domain>` and reports that attempt
    ///
    /// Never fails: every problem is recorded on the returned result.
    pub async fn scan(&self, target: Target) -> ScanResult {
        let started = Instant::now();

        if let Err(e) = validate_domain(&target.domain) {
            return ScanResult {
                target,
                found: false,
                protocol: Protocol::None,
                error: Some(e),
                duration: started.elapsed(),
                timeout_retries: 0,
            };
        }

        let mut timeout_retries = 0;
        let mut protocol = Protocol::None;
        let mut outcome = FetchOutcome::completed(false);

        for scheme in [Protocol::Http, Protocol::Https] {
            protocol = scheme;
            outcome = self
                .attempt(scheme, &target.domain, &mut timeout_retries)
                .await;
            if outcome.matched {
                break;
            }
        }

        ScanResult {
            target,
            found: outcome.matched,
            protocol,
            error: outcome.error,
            duration: started.elapsed(),
            timeout_retries,
        }
    }

    /// Run one scheme attempt, retrying timeouts after the global pause.
    async fn attempt(&self, protocol: Protocol, domain: &str, retries: &mut u32) -> FetchOutcome {
        let Some(url) = build_url(protocol, domain) else {
            return FetchOutcome::completed(false);
        };

        let mut attempt_retries = 0;
        loop {
            let permit = self.backoff.acquire().await;
            let outcome = self.fetcher.fetch(&url, &self.config.marker).await;

            if !outcome.is_timeout() {
                return outcome;
            }

            self.backoff.signal_pause(&permit).await;

            if attempt_retries >= self.config.max_timeout_retries {
                debug!(url = %url, retries = attempt_retries, "giving up after repeated timeouts");
                return outcome;
            }

            attempt_retries += 1;
            *retries += 1;
            debug!(url = %url, retry = attempt_retries, "retrying after timeout");
        }
    }

    /// Scan targets and yield results as they complete.
    ///
    /// At most `concurrency` targets are in flight at once. Results come out
    /// in completion order, one per target.
    pub fn scan_stream(
        &self,
        targets: Vec<Target>,
    ) -> Pin<Box<dyn Stream<Item = ScanResult> + Send + '_>> {
        let concurrency = self.config.concurrency.max(1);
        let stream = stream::iter(targets)
            .map(move |target| self.scan(target))
            .buffer_unordered(concurrency);

        Box::pin(stream)
    }

    /// Scan all targets, forwarding matches to `sink`, and summarize the run.
    pub async fn scan_all(&self, targets: Vec<Target>, sink: &dyn ResultSink) -> ScanReport {
        let mut aggregator = Aggregator::new(sink);
        let mut results = self.scan_stream(targets);

        while let Some(result) = results.next().await {
            aggregator.record(result).await;
        }

        aggregator.finish(self.pause_cycles())
    }
}
