//! Display logic for the marker-scan CLI.
//!
//! This module handles all human-readable output: the header, one colored
//! line per outcome with a progress counter, the summary and the categorized
//! error summary. Uses only the `console` crate.

use console::style;
use marker_scan_lib::{ScanError, ScanReport, ScanResult};

use crate::{ErrorStats, RunSettings};

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a run.
pub fn print_header(domain_count: usize, settings: &RunSettings) {
    println!(
        "{} {} {}",
        style("marker-scan").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "| Scanning {} domain{} for '{}'",
            domain_count,
            if domain_count == 1 { "" } else { "s" },
            settings.scan.marker
        ))
        .dim(),
    );

    let meta_parts = [
        format!("Concurrency: {}", settings.scan.concurrency),
        format!(
            "Rate: {}ms + 0-{}ms",
            settings.scan.rate_base.as_millis(),
            settings.scan.rate_jitter.as_millis()
        ),
        format!("Pause: {}s", settings.scan.pause_duration.as_secs()),
        format!("Output: {}", settings.output),
    ];

    println!("{}", style(meta_parts.join(" | ")).dim());
    println!();
}

// ── Single result line ───────────────────────────────────────────────────────

/// Plain-text outcome line for a result.
pub fn format_outcome(result: &ScanResult, marker: &str) -> String {
    let domain = &result.target.domain;
    match &result.error {
        Some(error) => format!("Error fetching domain {}: {}", domain, error),
        None if result.found => format!(
            "Found '{}' on {} ({})",
            marker, domain, result.protocol
        ),
        None => format!("'{}' not found on {}", marker, domain),
    }
}

/// Print a single result with colors.
///
/// If `counter` is Some((current, total)), a progress prefix like `[3/8]` is shown.
pub fn print_result(
    result: &ScanResult,
    marker: &str,
    debug: bool,
    counter: Option<(usize, usize)>,
) {
    let prefix = match counter {
        Some((cur, total)) => {
            format!("{} ", style(format!("[{}/{}]", cur, total)).dim())
        }
        None => String::new(),
    };

    let line = format_outcome(result, marker);
    let styled = if result.error.is_some() {
        style(line).yellow()
    } else if result.found {
        style(line).green().bold()
    } else {
        style(line).dim()
    };
    println!("  {}{}", prefix, styled);

    if debug {
        println!(
            "    {} {}ms via {}, {} timeout retr{}",
            style("└─").dim(),
            result.duration.as_millis(),
            result.protocol,
            result.timeout_retries,
            if result.timeout_retries == 1 { "y" } else { "ies" },
        );
    }
}

// ── Input diagnostics ────────────────────────────────────────────────────────

/// Report malformed input lines on stderr.
pub fn print_skipped_lines(skipped: &[ScanError]) {
    eprintln!(
        "{} Skipped {} malformed input line{}:",
        style("warning:").yellow().bold(),
        skipped.len(),
        if skipped.len() == 1 { "" } else { "s" },
    );
    for error in skipped.iter().take(5) {
        eprintln!("  {}", error);
    }
    if skipped.len() > 5 {
        eprintln!("  ... and {} more", skipped.len() - 5);
    }
    eprintln!();
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary.
pub fn print_summary(report: &ScanReport, output_path: &str) {
    println!(
        "Checked {} domains in {:.2}s",
        report.checked,
        report.elapsed.as_secs_f64()
    );
    println!(
        "  {}  {}  {}  {}  {}",
        style(format!("{} found", report.found)).green(),
        style("|").dim(),
        style(format!("{} errors", report.errors)).yellow(),
        style("|").dim(),
        style(format!(
            "{} pause cycle{}",
            report.pause_cycles,
            if report.pause_cycles == 1 { "" } else { "s" }
        ))
        .dim(),
    );

    if report.found > 0 {
        println!("  {}", style(format!("Matches written to {}", output_path)).dim());
    }
    if report.sink_errors > 0 {
        println!(
            "  {}",
            style(format!(
                "{} match{} could not be written to {}",
                report.sink_errors,
                if report.sink_errors == 1 { "" } else { "es" },
                output_path
            ))
            .red()
        );
    }
}

// ── Error summary ────────────────────────────────────────────────────────────

/// Print a categorized error summary using colors.
pub fn print_error_summary(error_stats: &ErrorStats) {
    if !error_stats.has_errors() {
        return;
    }

    println!();
    println!(
        "  {}",
        style("Some domains could not be checked:").yellow()
    );

    for (label, domains) in error_stats.categories() {
        println!(
            "  {} {}",
            style("•").dim(),
            format_error_category(label, domains)
        );
    }
}

/// One error-summary line, e.g. `2 timeouts: a.com, b.com`.
pub(crate) fn format_error_category(label: &str, domains: &[String]) -> String {
    format!(
        "{} {}{}: {}",
        domains.len(),
        label,
        if domains.len() == 1 { "" } else { "s" },
        format_domain_list(domains, 5),
    )
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Join domains, showing at most `max_show` and a count of the rest.
pub(crate) fn format_domain_list(domains: &[String], max_show: usize) -> String {
    if domains.len() <= max_show {
        domains.join(", ")
    } else {
        let shown = &domains[..max_show];
        let remaining = domains.len() - max_show;
        format!("{}, ... and {} more", shown.join(", "), remaining)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use marker_scan_lib::{Protocol, Target};

    fn make_result(domain: &str, found: bool, protocol: Protocol, error: Option<ScanError>) -> ScanResult {
        ScanResult {
            target: Target::from_domain(domain),
            found,
            protocol,
            error,
            duration: std::time::Duration::ZERO,
            timeout_retries: 0,
        }
    }

    #[test]
    fn test_format_outcome_found() {
        let r = make_result("example.com", true, Protocol::Http, None);
        assert_eq!(
            format_outcome(&r, "https://choiceqr.com"),
            "Found 'https://choiceqr.com' on example.com (HTTP)"
        );
    }

    #[test]
    fn test_format_outcome_not_found() {
        let r = make_result("foo.test", false, Protocol::Https, None);
        assert_eq!(
            format_outcome(&r, "https://choiceqr.com"),
            "'https://choiceqr.com' not found on foo.test"
        );
    }

    #[test]
    fn test_format_outcome_error() {
        let r = make_result(
            "down.test",
            false,
            Protocol::Https,
            Some(ScanError::non_ok_status("https://down.test", 502)),
        );
        assert_eq!(
            format_outcome(&r, "x"),
            "Error fetching domain down.test: non-OK HTTP status 502 from https://down.test"
        );
    }

    #[test]
    fn test_format_domain_list() {
        let domains: Vec<String> = (0..3).map(|i| format!("d{}.com", i)).collect();
        assert_eq!(format_domain_list(&domains, 5), "d0.com, d1.com, d2.com");
        assert_eq!(format_domain_list(&domains, 2), "d0.com, d1.com, ... and 1 more");
    }
}
