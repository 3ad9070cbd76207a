//! Marker Scan CLI Application
//!
//! A command-line interface that scans a list of domains over HTTP and HTTPS
//! for a marker string. This CLI application provides a user-friendly
//! interface to the marker-scan-lib library.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use futures::StreamExt;
use marker_scan_lib::{
    load_env_config, load_targets, parse_duration_string, Aggregator, ConfigManager, EnvConfig,
    FileConfig, FileSink, ScanConfig, ScanError, Scanner, DEFAULT_INPUT_FILE,
    DEFAULT_OUTPUT_FILE,
};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for marker-scan
#[derive(Parser, Debug)]
#[command(name = "marker-scan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Sai Dutt G.V <gvs46@protonmail.com>")]
#[command(about = "Scan a list of domains over HTTP/HTTPS for a marker string")]
#[command(
    long_about = "Scan a list of domains over HTTP, then HTTPS, and record every domain whose page contains a marker string.\n\nRequests are paced by one shared jittered rate limiter, and any request timeout pauses all requests for a cooldown before scanning resumes."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Input list, one `domain;registrar;holder;nameserver;expiry` record per line
    #[arg(value_name = "INPUT", help_heading = "Input/Output")]
    pub input: Option<String>,

    /// File that receives `<domain> (<protocol>)` for every match
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Input/Output"
    )]
    pub output: Option<String>,

    /// Append to the output file instead of truncating it
    #[arg(long = "append", help_heading = "Input/Output")]
    pub append: bool,

    /// Text searched for in each page body
    #[arg(
        short = 'm',
        long = "marker",
        value_name = "TEXT",
        help_heading = "Scan"
    )]
    pub marker: Option<String>,

    /// Per-request timeout (e.g. 10s, 1500ms)
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "DUR",
        help_heading = "Scan"
    )]
    pub timeout: Option<String>,

    /// User-Agent header sent with every request
    #[arg(long = "user-agent", value_name = "UA", help_heading = "Scan")]
    pub user_agent: Option<String>,

    /// Fixed part of the interval between requests (default: 200ms)
    #[arg(long = "rate-base", value_name = "DUR", help_heading = "Pacing")]
    pub rate_base: Option<String>,

    /// Upper bound of the random part of the interval (default: 250ms)
    #[arg(long = "rate-jitter", value_name = "DUR", help_heading = "Pacing")]
    pub rate_jitter: Option<String>,

    /// Cooldown applied to all requests after a timeout (default: 5m)
    #[arg(long = "pause", value_name = "DUR", help_heading = "Pacing")]
    pub pause: Option<String>,

    /// Max domains in flight (default: 20, max: 1000)
    #[arg(
        short = 'c',
        long = "concurrency",
        value_name = "N",
        help_heading = "Pacing"
    )]
    pub concurrency: Option<usize>,

    /// Timeout retries per attempt before giving up (default: 3)
    #[arg(long = "max-retries", value_name = "N", help_heading = "Pacing")]
    pub max_retries: Option<u32>,

    /// Print the final report as JSON instead of text
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Only print the summary, not one line per domain
    #[arg(short = 'q', long = "quiet", help_heading = "Output Format")]
    pub quiet: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show detailed debug information and error messages
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunSettings {
    pub(crate) scan: ScanConfig,
    pub(crate) input: String,
    pub(crate) output: String,
    pub(crate) append: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            input: DEFAULT_INPUT_FILE.to_string(),
            output: DEFAULT_OUTPUT_FILE.to_string(),
            append: false,
        }
    }
}

/// Error statistics for aggregated reporting
#[derive(Debug, Default)]
pub(crate) struct ErrorStats {
    pub(crate) timeouts: Vec<String>,
    pub(crate) network_errors: Vec<String>,
    pub(crate) status_errors: Vec<String>,
    pub(crate) invalid_domains: Vec<String>,
    pub(crate) other_errors: Vec<String>,
}

impl ErrorStats {
    fn add_error(&mut self, domain: &str, error: &ScanError) {
        let bucket = match error {
            ScanError::Timeout { .. } => &mut self.timeouts,
            ScanError::Network { .. } => &mut self.network_errors,
            ScanError::NonOkStatus { .. } => &mut self.status_errors,
            ScanError::InvalidDomain { .. } => &mut self.invalid_domains,
            _ => &mut self.other_errors,
        };
        bucket.push(domain.to_string());
    }

    fn has_errors(&self) -> bool {
        !self.timeouts.is_empty()
            || !self.network_errors.is_empty()
            || !self.status_errors.is_empty()
            || !self.invalid_domains.is_empty()
            || !self.other_errors.is_empty()
    }

    /// Non-empty categories as `(label, domains)`, in display order.
    fn categories(&self) -> Vec<(&'static str, &[String])> {
        [
            ("timeout", self.timeouts.as_slice()),
            ("network error", self.network_errors.as_slice()),
            ("HTTP status error", self.status_errors.as_slice()),
            ("invalid domain", self.invalid_domains.as_slice()),
            ("other error", self.other_errors.as_slice()),
        ]
        .into_iter()
        .filter(|(_, domains)| !domains.is_empty())
        .collect()
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_logging(&args);
    debug!("marker-scan v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_scan(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Install the `tracing` subscriber.
///
/// `RUST_LOG` wins when set. Otherwise only pause notices and errors are
/// logged; `-v` raises both crates to debug and `-d` to trace.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(default_log_directives(args))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(args.debug)
        .init();
}

fn default_log_directives(args: &Args) -> String {
    let level = if args.debug {
        "trace"
    } else if args.verbose {
        "debug"
    } else {
        return "error,marker_scan_lib::backoff=info".to_string();
    };
    format!("warn,marker_scan={0},marker_scan_lib={0}", level)
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 || concurrency > 1000 {
            return Err("Concurrency must be between 1 and 1000".to_string());
        }
    }

    if args.marker.as_deref().is_some_and(str::is_empty) {
        return Err("Marker cannot be empty".to_string());
    }

    let durations = [
        ("--timeout", &args.timeout),
        ("--rate-base", &args.rate_base),
        ("--rate-jitter", &args.rate_jitter),
        ("--pause", &args.pause),
    ];
    for (flag, value) in durations {
        if let Some(value) = value {
            match parse_duration_string(value) {
                None => {
                    return Err(format!(
                        "Invalid {} value '{}'. Use format like '250ms', '10s', '5m'",
                        flag, value
                    ))
                }
                Some(d) if flag == "--timeout" && d.is_zero() => {
                    return Err("Timeout must be greater than zero".to_string())
                }
                Some(d) if flag == "--rate-base" && d.is_zero() => {
                    return Err("Rate base interval must be greater than zero".to_string())
                }
                Some(_) => {}
            }
        }
    }

    Ok(())
}

/// Main scanning logic
async fn run_scan(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let settings = build_settings(&args)?;

    let parsed = load_targets(&settings.input)?;
    if !parsed.skipped.is_empty() {
        ui::print_skipped_lines(&parsed.skipped);
    }

    let sink = if settings.append {
        FileSink::append(&settings.output).await?
    } else {
        FileSink::create(&settings.output).await?
    };

    let scanner = Scanner::with_config(settings.scan.clone())?;
    let total = parsed.targets.len();
    let show_lines = !args.json && !args.quiet;

    if show_lines {
        ui::print_header(total, &settings);
    }

    let mut aggregator = Aggregator::new(&sink);
    let mut error_stats = ErrorStats::default();
    let mut results = scanner.scan_stream(parsed.targets);

    while let Some(result) = results.next().await {
        if let Some(error) = &result.error {
            error_stats.add_error(&result.target.domain, error);
        }
        if show_lines {
            let counter = (aggregator.checked() + 1, total);
            ui::print_result(&result, &settings.scan.marker, args.debug, Some(counter));
        }
        aggregator.record(result).await;
    }

    let report = aggregator.finish(scanner.pause_cycles());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if show_lines && total > 0 {
            println!();
        }
        ui::print_summary(&report, &settings.output);
        ui::print_error_summary(&error_stats);
    }

    Ok(())
}

/// Build the run settings from all sources with proper precedence.
///
/// Precedence order (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables (MS_*)
/// 3. Explicit config file (--config or MS_CONFIG)
/// 4. Local config file (./marker-scan.toml or ./.marker-scan.toml)
/// 5. Global config file (~/.marker-scan.toml)
/// 6. XDG config file (~/.config/marker-scan/config.toml)
/// 7. Built-in defaults
fn build_settings(args: &Args) -> Result<RunSettings, Box<dyn std::error::Error>> {
    let mut settings = RunSettings::default();
    let env_config = load_env_config();
    let config_manager = ConfigManager::new(args.verbose);

    // Step 1: Load config files
    let explicit_path = args.config.as_ref().or(env_config.config.as_ref());
    if let Some(path) = explicit_path {
        debug!("Using explicit config file: {}", path);
        let file_config = config_manager
            .load_file(path)
            .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?;
        settings = merge_file_config_into_settings(settings, file_config);
    } else {
        debug!("Discovering config files");
        match config_manager.discover_and_load() {
            Ok(file_config) => {
                settings = merge_file_config_into_settings(settings, file_config);
            }
            Err(e) => debug!("Config discovery warning: {}", e),
        }
    }

    // Step 2: Apply environment variables (MS_*)
    settings = apply_environment_config(settings, &env_config);

    // Step 3: Apply CLI arguments (highest precedence)
    settings = apply_cli_args_to_settings(settings, args)?;

    settings.scan.validate()?;
    debug!(?settings, "resolved settings");

    Ok(settings)
}

/// Merge FileConfig into RunSettings.
///
/// Files are validated on load, so unparsable durations never reach here.
fn merge_file_config_into_settings(mut settings: RunSettings, file_config: FileConfig) -> RunSettings {
    if let Some(scan) = file_config.scan {
        if let Some(marker) = scan.marker {
            settings.scan.marker = marker;
        }
        if let Some(timeout) = scan.timeout.as_deref().and_then(parse_duration_string) {
            settings.scan.request_timeout = timeout;
        }
        if let Some(base) = scan.rate_base.as_deref().and_then(parse_duration_string) {
            settings.scan.rate_base = base;
        }
        if let Some(jitter) = scan.rate_jitter.as_deref().and_then(parse_duration_string) {
            settings.scan.rate_jitter = jitter;
        }
        if let Some(pause) = scan.pause.as_deref().and_then(parse_duration_string) {
            settings.scan.pause_duration = pause;
        }
        if let Some(concurrency) = scan.concurrency {
            settings.scan.concurrency = concurrency;
        }
        if let Some(retries) = scan.max_timeout_retries {
            settings.scan.max_timeout_retries = retries;
        }
        if let Some(user_agent) = scan.user_agent {
            settings.scan.user_agent = user_agent;
        }
    }

    if let Some(files) = file_config.files {
        if let Some(input) = files.input {
            settings.input = input;
        }
        if let Some(output) = files.output {
            settings.output = output;
        }
        if let Some(append) = files.append {
            settings.append = append;
        }
    }

    settings
}

/// Apply environment variables to settings.
///
/// Values were already validated by the library's `load_env_config()`.
fn apply_environment_config(mut settings: RunSettings, env_config: &EnvConfig) -> RunSettings {
    if let Some(marker) = &env_config.marker {
        settings.scan.marker = marker.clone();
    }
    if let Some(timeout) = env_config.timeout {
        settings.scan.request_timeout = timeout;
    }
    if let Some(base) = env_config.rate_base {
        settings.scan.rate_base = base;
    }
    if let Some(jitter) = env_config.rate_jitter {
        settings.scan.rate_jitter = jitter;
    }
    if let Some(pause) = env_config.pause {
        settings.scan.pause_duration = pause;
    }
    if let Some(concurrency) = env_config.concurrency {
        settings.scan.concurrency = concurrency;
    }
    if let Some(retries) = env_config.max_timeout_retries {
        settings.scan.max_timeout_retries = retries;
    }
    if let Some(user_agent) = &env_config.user_agent {
        settings.scan.user_agent = user_agent.clone();
    }
    if let Some(input) = &env_config.input {
        settings.input = input.clone();
    }
    if let Some(output) = &env_config.output {
        settings.output = output.clone();
    }

    settings
}

/// Apply CLI arguments to settings (highest precedence).
///
/// Only flags the user actually passed override lower layers.
fn apply_cli_args_to_settings(
    mut settings: RunSettings,
    args: &Args,
) -> Result<RunSettings, Box<dyn std::error::Error>> {
    let duration = |flag: &str, value: &str| {
        parse_duration_string(value).ok_or_else(|| format!("Invalid {} value '{}'", flag, value))
    };

    if let Some(marker) = &args.marker {
        settings.scan.marker = marker.clone();
    }
    if let Some(timeout) = &args.timeout {
        settings.scan.request_timeout = duration("--timeout", timeout)?;
    }
    if let Some(base) = &args.rate_base {
        settings.scan.rate_base = duration("--rate-base", base)?;
    }
    if let Some(jitter) = &args.rate_jitter {
        settings.scan.rate_jitter = duration("--rate-jitter", jitter)?;
    }
    if let Some(pause) = &args.pause {
        settings.scan.pause_duration = duration("--pause", pause)?;
    }
    if let Some(concurrency) = args.concurrency {
        settings.scan.concurrency = concurrency;
    }
    if let Some(retries) = args.max_retries {
        settings.scan.max_timeout_retries = retries;
    }
    if let Some(user_agent) = &args.user_agent {
        settings.scan.user_agent = user_agent.clone();
    }
    if let Some(input) = &args.input {
        settings.input = input.clone();
    }
    if let Some(output) = &args.output {
        settings.output = output.clone();
    }
    if args.append {
        settings.append = true;
    }

    Ok(settings)
}
