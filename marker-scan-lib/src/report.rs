//! Result aggregation and the positive results sink.
//!
//! The [`Aggregator`] consumes scan results in completion order, keeps the
//! run counters, forwards every match to a [`ResultSink`] and emits one
//! `tracing` event per outcome.

use crate::error::ScanError;
use crate::types::{ScanReport, ScanResult};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Destination for positive results, one line per match.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Write a single line. The sink appends the line terminator.
    async fn write_line(&self, line: &str) -> std::io::Result<()>;
}

/// Append-only text file sink.
///
/// Every line goes out in a single `write_all` under a mutex, so lines from
/// concurrent writers never interleave.
#[derive(Debug)]
pub struct FileSink {
    path: String,
    file: tokio::sync::Mutex<File>,
}

impl FileSink {
    /// Create the file, truncating any previous contents.
    pub async fn create<P: AsRef<Path>>(path: P) -> Result<Self, ScanError> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        Self::open_with(path.as_ref(), &options).await
    }

    /// Open the file for appending, creating it if needed.
    pub async fn append<P: AsRef<Path>>(path: P) -> Result<Self, ScanError> {
        let mut options = OpenOptions::new();
        options.append(true).create(true);
        Self::open_with(path.as_ref(), &options).await
    }

    async fn open_with(path: &Path, options: &OpenOptions) -> Result<Self, ScanError> {
        let display = path.display().to_string();
        let file = options
            .open(path)
            .await
            .map_err(|e| ScanError::file_error(&display, e.to_string()))?;

        Ok(Self {
            path: display,
            file: tokio::sync::Mutex::new(file),
        })
    }

    /// Path this sink writes to.
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl ResultSink for FileSink {
    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        let record = format!("{}\n", line);
        let mut file = self.file.lock().await;
        file.write_all(record.as_bytes()).await?;
        file.flush().await
    }
}

/// In-memory sink, mostly useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far, in write order.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}

/// Collects scan results into a [`ScanReport`].
pub struct Aggregator<'a> {
    sink: &'a dyn ResultSink,
    started: Instant,
    checked: usize,
    found: usize,
    errors: usize,
    sink_errors: usize,
    results: Vec<ScanResult>,
}

impl<'a> Aggregator<'a> {
    /// Start aggregating; the elapsed time is measured from here.
    pub fn new(sink: &'a dyn ResultSink) -> Self {
        Self {
            sink,
            started: Instant::now(),
            checked: 0,
            found: 0,
            errors: 0,
            sink_errors: 0,
            results: Vec::new(),
        }
    }

    /// Record one result.
    ///
    /// A failed sink write is logged and counted; it never stops the run.
    pub async fn record(&mut self, result: ScanResult) {
        self.checked += 1;
        let domain = result.target.domain.as_str();

        if let Some(error) = &result.error {
            self.errors += 1;
            warn!(domain, kind = error.kind(), "Error fetching domain {}: {}", domain, error);
        }

        if result.found {
            self.found += 1;
            info!(domain, protocol = %result.protocol, "Found marker on {} ({})", domain, result.protocol);

            if let Err(e) = self.sink.write_line(&result.sink_line()).await {
                self.sink_errors += 1;
                let error = ScanError::sink_write(domain, e.to_string());
                warn!(domain, "{}", error);
            }
        } else if result.error.is_none() {
            debug!(domain, "Marker not found on {}", domain);
        }

        self.results.push(result);
    }

    /// Number of results recorded so far.
    pub fn checked(&self) -> usize {
        self.checked
    }

    /// Number of matches recorded so far.
    pub fn found(&self) -> usize {
        self.found
    }

    /// Close the run and produce the summary.
    pub fn finish(self, pause_cycles: u64) -> ScanReport {
        let elapsed = self.started.elapsed();
        info!(checked = self.checked, found = self.found, "Checked {} domains", self.checked);

        ScanReport {
            checked: self.checked,
            found: self.found,
            errors: self.errors,
            sink_errors: self.sink_errors,
            pause_cycles,
            elapsed,
            results: self.results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Protocol, Target};
    use std::time::Duration;
    use tempfile::tempdir;

    fn result(domain: &str, found: bool, protocol: Protocol, error: Option<ScanError>) -> ScanResult {
        ScanResult {
            target: Target::from_domain(domain),
            found,
            protocol,
            error,
            duration: Duration::ZERO,
            timeout_retries: 0,
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl ResultSink for BrokenSink {
        async fn write_line(&self, _line: &str) -> std::io::Result<()> {
            Err(std::io::Error::other("disk full"))
        }
    }

    #[tokio::test]
    async fn test_aggregator_counts_and_forwards_matches() {
        let sink = MemorySink::new();
        let mut aggregator = Aggregator::new(&sink);

        aggregator.record(result("example.com", true, Protocol::Http, None)).await;
        aggregator.record(result("foo.test", false, Protocol::Https, None)).await;
        aggregator
            .record(result(
                "down.test",
                false,
                Protocol::Https,
                Some(ScanError::network("https://down.test", "refused")),
            ))
            .await;

        let report = aggregator.finish(0);
        assert_eq!(report.checked, 3);
        assert_eq!(report.found, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(report.sink_errors, 0);
        assert_eq!(sink.lines(), vec!["example.com (HTTP)".to_string()]);
        assert_eq!(report.positive_lines(), sink.lines());
    }

    #[tokio::test]
    async fn test_sink_failure_is_counted_not_fatal() {
        let sink = BrokenSink;
        let mut aggregator = Aggregator::new(&sink);

        aggregator.record(result("a.com", true, Protocol::Http, None)).await;
        aggregator.record(result("b.com", true, Protocol::Https, None)).await;

        let report = aggregator.finish(2);
        assert_eq!(report.checked, 2);
        assert_eq!(report.found, 2);
        assert_eq!(report.sink_errors, 2);
        assert_eq!(report.pause_cycles, 2);
    }

    #[tokio::test]
    async fn test_file_sink_create_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("positive_results.txt");
        std::fs::write(&path, "stale.com (HTTP)\n").unwrap();

        let sink = FileSink::create(&path).await.unwrap();
        sink.write_line("example.com (HTTP)").await.unwrap();
        sink.write_line("other.org (HTTPS)").await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "example.com (HTTP)\nother.org (HTTPS)\n");
    }

    #[tokio::test]
    async fn test_file_sink_append_keeps_existing_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("positive_results.txt");
        std::fs::write(&path, "first.com (HTTP)\n").unwrap();

        let sink = FileSink::append(&path).await.unwrap();
        sink.write_line("second.com (HTTPS)").await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first.com (HTTP)\nsecond.com (HTTPS)\n");
    }

    #[tokio::test]
    async fn test_file_sink_concurrent_lines_do_not_interleave() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let sink = FileSink::create(&path).await.unwrap();

        let lines: Vec<String> = (0..50).map(|i| format!("site{}.test (HTTP)", i)).collect();
        futures::future::join_all(lines.iter().map(|l| sink.write_line(l))).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut written: Vec<&str> = contents.lines().collect();
        let mut expected: Vec<&str> = lines.iter().map(String::as_str).collect();
        written.sort_unstable();
        expected.sort_unstable();
        assert_eq!(written, expected);
    }

    #[tokio::test]
    async fn test_file_sink_missing_directory_is_file_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");

        let err = FileSink::create(&path).await.unwrap_err();
        assert!(matches!(err, ScanError::File { .. }));
    }
}
