//! Error handling for scan operations.
//!
//! This module defines the error type shared by every layer of the scanner,
//! from a single page fetch up to loading the input list. Only
//! [`ScanError::Timeout`] has an effect beyond the target it belongs to: it
//! triggers the global pause.

use std::fmt;
use std::time::Duration;

/// Main error type for scan operations.
///
/// Per-target variants (`Timeout`, `Network`, `NonOkStatus`, `Read`,
/// `InvalidDomain`) are recorded on the target's result and never abort a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanError {
    /// The request did not complete within the configured timeout
    Timeout { url: String, duration: Duration },

    /// Connection refused, DNS failure, TLS failure and similar
    Network { url: String, message: String },

    /// The server answered with anything other than `200 OK`
    NonOkStatus { url: String, status: u16 },

    /// The response body could not be read after a `200 OK`
    Read { url: String, message: String },

    /// A target's domain is not usable as a URL host
    InvalidDomain { domain: String, reason: String },

    /// Malformed record in the input list
    Parse {
        line: usize,
        content: String,
        reason: String,
    },

    /// Writing a positive result to the sink failed
    SinkWrite { domain: String, message: String },

    /// Configuration errors (invalid settings, unparsable files, etc.)
    Config { message: String },

    /// File I/O errors when reading the input list or opening the sink
    File { path: String, message: String },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl ScanError {
    /// Create a new timeout error.
    pub fn timeout<U: Into<String>>(url: U, duration: Duration) -> Self {
        Self::Timeout {
            url: url.into(),
            duration,
        }
    }

    /// Create a new network error.
    pub fn network<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a new non-OK status error.
    pub fn non_ok_status<U: Into<String>>(url: U, status: u16) -> Self {
        Self::NonOkStatus {
            url: url.into(),
            status,
        }
    }

    /// Create a new body read error.
    pub fn read<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Read {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new input record parse error.
    pub fn parse<C: Into<String>, R: Into<String>>(line: usize, content: C, reason: R) -> Self {
        Self::Parse {
            line,
            content: content.into(),
            reason: reason.into(),
        }
    }

    /// Create a new sink write error.
    pub fn sink_write<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::SinkWrite {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error should trigger the global pause.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Short category label used in logs and error summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Network { .. } => "network",
            Self::NonOkStatus { .. } => "status",
            Self::Read { .. } => "read",
            Self::InvalidDomain { .. } => "invalid-domain",
            Self::Parse { .. } => "parse",
            Self::SinkWrite { .. } => "sink",
            Self::Config { .. } => "config",
            Self::File { .. } => "file",
            Self::Internal { .. } => "internal",
        }
    }

    /// Classify a `reqwest` failure for the given URL.
    ///
    /// Timeouts are kept apart from every other transport failure because the
    /// coordinator reacts to them differently.
    pub fn from_reqwest(url: &str, err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::timeout(url, timeout)
        } else if err.is_connect() {
            Self::network(url, format!("connection failed: {}", err))
        } else if err.is_body() || err.is_decode() {
            Self::read(url, err.to_string())
        } else {
            Self::network(url, err.to_string())
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { url, duration } => {
                write!(f, "Timeout after {:?} fetching {}", duration, url)
            }
            Self::Network { url, message } => {
                write!(f, "Network error for {}: {}", url, message)
            }
            Self::NonOkStatus { url, status } => {
                write!(f, "non-OK HTTP status {} from {}", status, url)
            }
            Self::Read { url, message } => {
                write!(f, "Failed to read body from {}: {}", url, message)
            }
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::Parse {
                line,
                content,
                reason,
            } => {
                write!(f, "Invalid line {} ({}): {}", line, reason, content)
            }
            Self::SinkWrite { domain, message } => {
                write!(f, "Error writing result for '{}': {}", domain, message)
            }
            Self::Config { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::File { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for ScanError {}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        Self::from_reqwest(&url, &err, Duration::ZERO)
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}
