//! Protocol implementations used to fetch pages.
//!
//! Only plain HTTP(S) GET is needed: the scheme is picked by the coordinator,
//! the fetcher just performs one request.

/// HTTP(S) page fetcher
pub mod http;

// Re-export commonly used functions and types
pub use http::{contains_marker, HttpFetcher, PageFetcher};
