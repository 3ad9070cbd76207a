//! # Marker Scan Library
//!
//! A rate-limited, concurrent engine that fetches each domain of a list over
//! HTTP (then HTTPS) and reports which pages contain a marker string.
//!
//! All requests share one jittered rate limiter. A request timeout pauses
//! every worker for a cooldown, so a struggling network or upstream gets room
//! to recover before scanning resumes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marker_scan_lib::{load_targets, FileSink, ScanConfig, Scanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let input = load_targets("domains.txt")?;
//!     let sink = FileSink::create("positive_results.txt").await?;
//!
//!     let scanner = Scanner::with_config(ScanConfig::default())?;
//!     let report = scanner.scan_all(input.targets, &sink).await;
//!
//!     println!("Checked {} domains in {:.2}s", report.checked, report.elapsed.as_secs_f64());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Scheme fallback**: HTTP first, HTTPS only when HTTP did not match
//! - **Shared pacing**: one permit per `base + uniform(0, jitter)` interval
//! - **Global pause**: concurrent timeouts collapse into a single cooldown
//! - **Streaming results**: outcomes are yielded in completion order
//! - **Configurable**: TOML files and `MS_*` environment variables

// Re-export main public API types and functions
// This makes them available as marker_scan_lib::TypeName
pub use backoff::{Backoff, Permit};
pub use config::{
    load_env_config, parse_duration_string, ConfigManager, EnvConfig, FileConfig, FilesSection,
    ScanSection, DEFAULT_INPUT_FILE, DEFAULT_OUTPUT_FILE,
};
pub use error::ScanError;
pub use input::{load_targets, parse_line, parse_targets, ParsedInput};
pub use limiter::RateLimiter;
pub use protocols::{contains_marker, HttpFetcher, PageFetcher};
pub use report::{Aggregator, FileSink, MemorySink, ResultSink};
pub use scanner::Scanner;
pub use types::{
    FetchOutcome, Protocol, ScanConfig, ScanReport, ScanResult, Target, DEFAULT_MARKER,
    DEFAULT_USER_AGENT,
};
pub use utils::{build_url, validate_domain};

// Internal modules - these are not part of the public API
mod backoff;
mod config;
mod error;
mod input;
mod limiter;
mod protocols;
mod report;
mod scanner;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScanError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Get library information for debugging or display purposes.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        author: AUTHOR,
    }
}

/// Information about the library build
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub author: &'static str,
}
