// marker-scan/tests/cli_integration.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

/// Command isolated from the caller's config files and MS_* variables.
fn marker_scan(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("marker-scan").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("RUST_LOG");
    for var in [
        "MS_MARKER",
        "MS_TIMEOUT",
        "MS_RATE_BASE",
        "MS_RATE_JITTER",
        "MS_PAUSE",
        "MS_CONCURRENCY",
        "MS_MAX_RETRIES",
        "MS_USER_AGENT",
        "MS_INPUT",
        "MS_OUTPUT",
        "MS_CONFIG",
        "HTTP_PROXY",
        "http_proxy",
        "ALL_PROXY",
        "all_proxy",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Helper to create a test input file inside `dir`
fn create_input_file(dir: &TempDir, lines: &[String]) -> String {
    let path = dir.path().join("domains.txt");
    fs::write(&path, lines.join("\n")).expect("Failed to write input file");
    path.to_string_lossy().into_owned()
}

fn record(domain: &str) -> String {
    format!("{};REG-1;HOLDER-1;ns1.example.net;2030-01-01", domain)
}

/// Flags that keep the pacing fast enough for tests.
const FAST: [&str; 6] = ["--rate-base", "10ms", "--rate-jitter", "0ms", "--timeout", "2s"];

#[test]
fn test_help_shows_flags() {
    let dir = tempdir().unwrap();
    marker_scan(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--marker"))
        .stdout(predicate::str::contains("--pause"))
        .stdout(predicate::str::contains("--rate-base"))
        .stdout(predicate::str::contains("--append"));
}

#[test]
fn test_missing_input_file_is_fatal() {
    let dir = tempdir().unwrap();
    marker_scan(dir.path())
        .arg("does-not-exist.txt")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does-not-exist.txt"));
}

#[test]
fn test_default_input_file_is_used() {
    let dir = tempdir().unwrap();
    // No positional argument and no domains.txt in the working directory.
    marker_scan(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("domains.txt"));
}

#[test]
fn test_invalid_concurrency_rejected() {
    let dir = tempdir().unwrap();
    marker_scan(dir.path())
        .args(["-c", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Concurrency must be between 1 and 1000"));
}

#[test]
fn test_invalid_pause_rejected() {
    let dir = tempdir().unwrap();
    marker_scan(dir.path())
        .args(["--pause", "forever"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid --pause value"));
}

#[test]
fn test_empty_input_checks_zero_domains() {
    let dir = tempdir().unwrap();
    let input = create_input_file(&dir, &[]);

    marker_scan(dir.path())
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Checked 0 domains"));

    let output = fs::read_to_string(dir.path().join("positive_results.txt")).unwrap();
    assert!(output.is_empty());
}

#[test]
fn test_scan_finds_marker_and_writes_output() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_body("<footer>Menu by https://choiceqr.com</footer>")
        .create();
    let host = server.host_with_port();

    let dir = tempdir().unwrap();
    let input = create_input_file(
        &dir,
        &[
            "# exported zone".to_string(),
            record(&host),
            "broken;line".to_string(),
        ],
    );

    marker_scan(dir.path())
        .arg(&input)
        .args(FAST)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Found 'https://choiceqr.com' on {} (HTTP)",
            host
        )))
        .stdout(predicate::str::contains("[1/1]"))
        .stdout(predicate::str::contains("Checked 1 domains"))
        .stderr(predicate::str::contains("Skipped 1 malformed input line"));

    let output = fs::read_to_string(dir.path().join("positive_results.txt")).unwrap();
    assert_eq!(output, format!("{} (HTTP)\n", host));
}

#[test]
fn test_marker_from_config_file() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_body("powered by acme-widgets")
        .create();
    let host = server.host_with_port();

    let dir = tempdir().unwrap();
    let input = create_input_file(&dir, &[record(&host)]);
    let config_path = dir.path().join("custom.toml");
    fs::write(
        &config_path,
        "[scan]\nmarker = \"acme-widgets\"\n\n[files]\noutput = \"acme.txt\"\n",
    )
    .unwrap();

    marker_scan(dir.path())
        .arg(&input)
        .args(FAST)
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 'acme-widgets'"));

    let output = fs::read_to_string(dir.path().join("acme.txt")).unwrap();
    assert_eq!(output, format!("{} (HTTP)\n", host));
}

#[test]
fn test_append_keeps_previous_results() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_body("https://choiceqr.com")
        .create();
    let host = server.host_with_port();

    let dir = tempdir().unwrap();
    let input = create_input_file(&dir, &[record(&host)]);
    let output_path = dir.path().join("hits.txt");
    fs::write(&output_path, "earlier.com (HTTPS)\n").unwrap();

    marker_scan(dir.path())
        .arg(&input)
        .args(FAST)
        .args(["--output", "hits.txt", "--append", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found").not())
        .stdout(predicate::str::contains("Checked 1 domains"));

    let output = fs::read_to_string(&output_path).unwrap();
    assert_eq!(output, format!("earlier.com (HTTPS)\n{} (HTTP)\n", host));
}

#[test]
fn test_json_report() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_body("https://choiceqr.com")
        .create();
    let host = server.host_with_port();

    let dir = tempdir().unwrap();
    let input = create_input_file(&dir, &[record(&host)]);

    let assert = marker_scan(dir.path())
        .arg(&input)
        .args(FAST)
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["checked"], 1);
    assert_eq!(report["found"], 1);
    assert_eq!(report["results"][0]["protocol"], "HTTP");
    assert_eq!(report["results"][0]["target"]["registrar_id"], "REG-1");
}
