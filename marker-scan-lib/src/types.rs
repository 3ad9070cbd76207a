//! Core data types for marker scanning.
//!
//! This module defines the main data structures used throughout the library:
//! input targets, per-attempt fetch outcomes, per-target scan results, the
//! engine configuration and the final report.

use crate::error::ScanError;
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

/// Default marker searched for in page bodies.
pub const DEFAULT_MARKER: &str = "https://choiceqr.com";

/// Browser-identifying `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// One domain record from the input list with its registration metadata.
///
/// Targets are created by the input parser and only ever read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// The domain to scan (e.g., "example.com")
    pub domain: String,

    /// Registrar identifier from the input record
    pub registrar_id: String,

    /// Holder identifier from the input record
    pub holder_id: String,

    /// Nameserver from the input record
    pub nameserver: String,

    /// Registration expiry date, kept verbatim
    pub expiry_date: String,
}

impl Target {
    /// Create a target that carries only a domain, with empty metadata.
    pub fn from_domain<D: Into<String>>(domain: D) -> Self {
        Self {
            domain: domain.into(),
            registrar_id: String::new(),
            holder_id: String::new(),
            nameserver: String::new(),
            expiry_date: String::new(),
        }
    }
}

/// URL scheme an outcome was resolved over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "HTTP")]
    Http,

    #[serde(rename = "HTTPS")]
    Https,

    /// No request was made for this target
    #[serde(rename = "NONE")]
    None,
}

impl Protocol {
    /// URL scheme prefix, or `None` for [`Protocol::None`].
    pub fn scheme(&self) -> Option<&'static str> {
        match self {
            Protocol::Http => Some("http"),
            Protocol::Https => Some("https"),
            Protocol::None => None,
        }
    }
}

/// Result of a single fetch attempt over one scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Whether the marker occurred in a successfully retrieved body
    pub matched: bool,

    /// Why the attempt failed, if it did
    pub error: Option<ScanError>,
}

impl FetchOutcome {
    /// A completed fetch; `matched` tells whether the marker was present.
    pub fn completed(matched: bool) -> Self {
        Self {
            matched,
            error: None,
        }
    }

    /// A failed fetch. Failed fetches never match.
    pub fn failed(error: ScanError) -> Self {
        Self {
            matched: false,
            error: Some(error),
        }
    }

    /// Whether this attempt ended in a timeout.
    pub fn is_timeout(&self) -> bool {
        self.error.as_ref().is_some_and(ScanError::is_timeout)
    }
}

/// Final outcome for one target.
///
/// Exactly one `ScanResult` is produced per target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    /// The target this result belongs to
    pub target: Target,

    /// Whether the marker was found
    pub found: bool,

    /// Scheme the final state was resolved over
    pub protocol: Protocol,

    /// Terminal error of the last attempt, if any
    #[serde(
        serialize_with = "serialize_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<ScanError>,

    /// Time spent on this target, including pacing and pause waits
    pub duration: Duration,

    /// Number of timeout-triggered retries this target went through
    pub timeout_retries: u32,
}

impl ScanResult {
    /// Line written to the positive results sink: `<domain> (<protocol>)`.
    pub fn sink_line(&self) -> String {
        format!("{} ({})", self.target.domain, self.protocol)
    }
}

fn serialize_error<S: Serializer>(error: &Option<ScanError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_str(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Configuration options for a scan run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Literal substring searched for in page bodies
    pub marker: String,

    /// Timeout for each individual request
    /// Default: 10 seconds
    pub request_timeout: Duration,

    /// Fixed part of the pacing interval between permits
    /// Default: 200ms
    pub rate_base: Duration,

    /// Upper bound of the random part added to `rate_base`
    /// Default: 250ms
    pub rate_jitter: Duration,

    /// How long every worker is held back after a timeout
    /// Default: 5 minutes
    pub pause_duration: Duration,

    /// Maximum number of targets in flight at once
    /// Default: 20, Range: 1-1000
    pub concurrency: usize,

    /// Timeout-triggered retries allowed per attempt before the timeout
    /// becomes that attempt's terminal error
    /// Default: 3
    pub max_timeout_retries: u32,

    /// `User-Agent` header value
    pub user_agent: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            request_timeout: Duration::from_secs(10),
            rate_base: Duration::from_millis(200),
            rate_jitter: Duration::from_millis(250),
            pause_duration: Duration::from_secs(5 * 60),
            concurrency: 20,
            max_timeout_retries: 3,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScanConfig {
    /// Set the marker to search for.
    pub fn with_marker<M: Into<String>>(mut self, marker: M) -> Self {
        self.marker = marker.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the pacing interval as `base + uniform(0, jitter)`.
    pub fn with_rate(mut self, base: Duration, jitter: Duration) -> Self {
        self.rate_base = base;
        self.rate_jitter = jitter;
        self
    }

    /// Set the cooldown applied after a timeout.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause_duration = pause;
        self
    }

    /// Set the number of targets in flight.
    ///
    /// Automatically clamped to 1-1000.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, 1000);
        self
    }

    /// Set the retry bound for timed-out attempts.
    pub fn with_max_timeout_retries(mut self, retries: u32) -> Self {
        self.max_timeout_retries = retries;
        self
    }

    /// Set the `User-Agent` header value.
    pub fn with_user_agent<U: Into<String>>(mut self, user_agent: U) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.marker.is_empty() {
            return Err(ScanError::config("Marker cannot be empty"));
        }
        if self.request_timeout.is_zero() {
            return Err(ScanError::config("Request timeout must be greater than zero"));
        }
        if self.rate_base.is_zero() {
            return Err(ScanError::config("Rate base interval must be greater than zero"));
        }
        if self.concurrency == 0 || self.concurrency > 1000 {
            return Err(ScanError::config("Concurrency must be between 1 and 1000"));
        }
        Ok(())
    }
}

/// Summary of a completed scan run.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Number of targets processed; equals the input size
    pub checked: usize,

    /// Number of targets where the marker was found
    pub found: usize,

    /// Number of targets whose result carries an error
    pub errors: usize,

    /// Number of positive results that could not be written to the sink
    pub sink_errors: usize,

    /// Number of global pauses executed during the run
    pub pause_cycles: u64,

    /// Wall-clock time of the whole run
    pub elapsed: Duration,

    /// All results, in completion order
    pub results: Vec<ScanResult>,
}

impl ScanReport {
    /// Domains where the marker was found, as written to the sink.
    pub fn positive_lines(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.found)
            .map(ScanResult::sink_line)
            .collect()
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Http => write!(f, "HTTP"),
            Protocol::Https => write!(f, "HTTPS"),
            Protocol::None => write!(f, "NONE"),
        }
    }
}
