//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and `MS_*`
//! environment variables, and merging file configurations with proper
//! precedence rules. Applying the layers onto a [`ScanConfig`] is left to the
//! caller, which knows where command-line values fit in.
//!
//! [`ScanConfig`]: crate::ScanConfig

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Input list read when none is given.
pub const DEFAULT_INPUT_FILE: &str = "domains.txt";

/// Positive results file written when none is given.
pub const DEFAULT_OUTPUT_FILE: &str = "positive_results.txt";

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Engine settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan: Option<ScanSection>,

    /// Input and output locations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<FilesSection>,
}

/// The `[scan]` table.
///
/// Durations are strings such as `"250ms"`, `"10s"` or `"5m"`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ScanSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_base: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_jitter: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_timeout_retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// The `[files]` table.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FilesSection {
    /// Input list path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    /// Positive results path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Append to the results file instead of truncating it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append: Option<bool>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// The file is validated after parsing; see [`validate_config`](Self::validate_config).
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, ScanError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScanError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ScanError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            ScanError::config(format!(
                "Failed to parse TOML configuration in {}: {}",
                path.display(),
                e
            ))
        })?;

        self.validate_config(&config)?;
        debug!(path = %path.display(), "loaded configuration file");

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is lowest, then the home directory, then the current
    /// directory. Files that fail to load are skipped with a warning.
    pub fn discover_and_load(&self) -> Result<FileConfig, ScanError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!("Ignoring configuration file: {}", e),
            }
        }

        if self.verbose && loaded_files.len() > 1 {
            info!("Multiple config files found, later ones take precedence:");
            for path in &loaded_files {
                info!("  {}", path.display());
            }
        }

        Ok(merged_config)
    }

    /// Get the local configuration file path.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./marker-scan.toml", "./.marker-scan.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Get the global configuration file path.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".marker-scan.toml", "marker-scan.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Get the XDG configuration file path.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("marker-scan").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations with proper precedence.
    ///
    /// Values from `higher` take precedence over values from `lower`, field by
    /// field.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            scan: match (lower.scan, higher.scan) {
                (Some(lower_scan), Some(higher_scan)) => Some(ScanSection {
                    marker: higher_scan.marker.or(lower_scan.marker),
                    timeout: higher_scan.timeout.or(lower_scan.timeout),
                    rate_base: higher_scan.rate_base.or(lower_scan.rate_base),
                    rate_jitter: higher_scan.rate_jitter.or(lower_scan.rate_jitter),
                    pause: higher_scan.pause.or(lower_scan.pause),
                    concurrency: higher_scan.concurrency.or(lower_scan.concurrency),
                    max_timeout_retries: higher_scan
                        .max_timeout_retries
                        .or(lower_scan.max_timeout_retries),
                    user_agent: higher_scan.user_agent.or(lower_scan.user_agent),
                }),
                (lower_scan, higher_scan) => higher_scan.or(lower_scan),
            },
            files: match (lower.files, higher.files) {
                (Some(lower_files), Some(higher_files)) => Some(FilesSection {
                    input: higher_files.input.or(lower_files.input),
                    output: higher_files.output.or(lower_files.output),
                    append: higher_files.append.or(lower_files.append),
                }),
                (lower_files, higher_files) => higher_files.or(lower_files),
            },
        }
    }

    /// Validate a configuration for common issues.
    pub fn validate_config(&self, config: &FileConfig) -> Result<(), ScanError> {
        let Some(scan) = &config.scan else {
            return Ok(());
        };

        if let Some(concurrency) = scan.concurrency {
            if concurrency == 0 || concurrency > 1000 {
                return Err(ScanError::config("Concurrency must be between 1 and 1000"));
            }
        }

        if scan.marker.as_deref().is_some_and(str::is_empty) {
            return Err(ScanError::config("Marker cannot be empty"));
        }

        if scan.user_agent.as_deref().is_some_and(|ua| ua.trim().is_empty()) {
            return Err(ScanError::config("User agent cannot be empty"));
        }

        let durations = [
            ("timeout", &scan.timeout),
            ("rate_base", &scan.rate_base),
            ("rate_jitter", &scan.rate_jitter),
            ("pause", &scan.pause),
        ];
        for (name, value) in durations {
            if let Some(value) = value {
                if parse_duration_string(value).is_none() {
                    return Err(ScanError::config(format!(
                        "Invalid {} format '{}'. Use format like '250ms', '10s', '5m'",
                        name, value
                    )));
                }
            }
        }

        if scan
            .timeout
            .as_deref()
            .and_then(parse_duration_string)
            .is_some_and(|d| d.is_zero())
        {
            return Err(ScanError::config("Timeout must be greater than zero"));
        }

        if scan
            .rate_base
            .as_deref()
            .and_then(parse_duration_string)
            .is_some_and(|d| d.is_zero())
        {
            return Err(ScanError::config(
                "Rate base interval must be greater than zero",
            ));
        }

        Ok(())
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// This represents configuration values that can be set via `MS_*`
/// environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub marker: Option<String>,
    pub timeout: Option<Duration>,
    pub rate_base: Option<Duration>,
    pub rate_jitter: Option<Duration>,
    pub pause: Option<Duration>,
    pub concurrency: Option<usize>,
    pub max_timeout_retries: Option<u32>,
    pub user_agent: Option<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub config: Option<String>,
}

impl EnvConfig {
    /// Build from an arbitrary variable lookup.
    ///
    /// Invalid values are logged as warnings and ignored.
    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let text = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .inspect(|v| debug!("Using {}={}", name, v))
        };
        let duration = |name: &str| {
            let value = text(name)?;
            let parsed = parse_duration_string(&value);
            if parsed.is_none() {
                warn!(
                    "Invalid {}='{}', use format like '250ms', '10s', '5m'",
                    name, value
                );
            }
            parsed
        };

        let concurrency = text("MS_CONCURRENCY").and_then(|val| match val.parse::<usize>() {
            Ok(n) if (1..=1000).contains(&n) => Some(n),
            _ => {
                warn!("Invalid MS_CONCURRENCY='{}', must be 1-1000", val);
                None
            }
        });

        let max_timeout_retries = text("MS_MAX_RETRIES").and_then(|val| match val.parse::<u32>() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!("Invalid MS_MAX_RETRIES='{}', must be a whole number", val);
                None
            }
        });

        Self {
            marker: text("MS_MARKER"),
            timeout: duration("MS_TIMEOUT").filter(|d| !d.is_zero()),
            rate_base: duration("MS_RATE_BASE"),
            rate_jitter: duration("MS_RATE_JITTER"),
            pause: duration("MS_PAUSE"),
            concurrency,
            max_timeout_retries,
            user_agent: text("MS_USER_AGENT"),
            input: text("MS_INPUT"),
            output: text("MS_OUTPUT"),
            config: text("MS_CONFIG"),
        }
    }
}

/// Load configuration from the process environment.
pub fn load_env_config() -> EnvConfig {
    EnvConfig::from_lookup(|name| env::var(name).ok())
}

/// Parse a duration string like "250ms", "10s", "5m".
///
/// A bare number is taken as seconds. Returns `None` if parsing fails.
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = value.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        value.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_parse_duration_string() {
        assert_eq!(parse_duration_string("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration_string("10s"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration_string("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration_string("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_duration_string(" 2M "), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration_string("soon"), None);
        assert_eq!(parse_duration_string("-1s"), None);
    }

    #[test]
    fn test_load_valid_config() {
        let temp_file = write_config(
            r#"
[scan]
marker = "powered-by-acme"
timeout = "5s"
rate_base = "100ms"
rate_jitter = "50ms"
pause = "2m"
concurrency = 50
max_timeout_retries = 1

[files]
input = "zone.txt"
output = "hits.txt"
"#,
        );

        let manager = ConfigManager::new(false);
        let config = manager.load_file(temp_file.path()).unwrap();

        let scan = config.scan.unwrap();
        assert_eq!(scan.marker.as_deref(), Some("powered-by-acme"));
        assert_eq!(scan.timeout.as_deref(), Some("5s"));
        assert_eq!(scan.concurrency, Some(50));
        assert_eq!(scan.max_timeout_retries, Some(1));

        let files = config.files.unwrap();
        assert_eq!(files.input.as_deref(), Some("zone.txt"));
        assert_eq!(files.output.as_deref(), Some("hits.txt"));
        assert_eq!(files.append, None);
    }

    #[test]
    fn test_invalid_concurrency() {
        let temp_file = write_config("[scan]\nconcurrency = 0\n");
        let result = ConfigManager::new(false).load_file(temp_file.path());
        assert!(matches!(result, Err(ScanError::Config { .. })));
    }

    #[test]
    fn test_invalid_duration() {
        let temp_file = write_config("[scan]\npause = \"a while\"\n");
        let result = ConfigManager::new(false).load_file(temp_file.path());
        assert!(matches!(result, Err(ScanError::Config { .. })));
    }

    #[test]
    fn test_zero_rate_base_rejected() {
        let temp_file = write_config("[scan]\nrate_base = \"0ms\"\nrate_jitter = \"0ms\"\n");
        let result = ConfigManager::new(false).load_file(temp_file.path());
        assert!(matches!(result, Err(ScanError::Config { .. })));

        let temp_file = write_config("[scan]\nrate_base = \"0ms\"\n");
        assert!(ConfigManager::new(false).load_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_empty_marker_rejected() {
        let temp_file = write_config("[scan]\nmarker = \"\"\n");
        assert!(ConfigManager::new(false).load_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let temp_file = write_config("[scan\nmarker = 1");
        let result = ConfigManager::new(false).load_file(temp_file.path());
        assert!(matches!(result, Err(ScanError::Config { .. })));
    }

    #[test]
    fn test_missing_file_is_file_error() {
        let result = ConfigManager::new(false).load_file("/no/such/marker-scan.toml");
        assert!(matches!(result, Err(ScanError::File { .. })));
    }

    #[test]
    fn test_merge_configs() {
        let manager = ConfigManager::new(false);

        let lower = FileConfig {
            scan: Some(ScanSection {
                marker: Some("old-marker".to_string()),
                concurrency: Some(10),
                pause: Some("1m".to_string()),
                ..Default::default()
            }),
            files: Some(FilesSection {
                input: Some("global.txt".to_string()),
                ..Default::default()
            }),
        };

        let higher = FileConfig {
            scan: Some(ScanSection {
                concurrency: Some(40),
                pause: Some("30s".to_string()),
                ..Default::default()
            }),
            files: None,
        };

        let merged = manager.merge_configs(lower, higher);
        let scan = merged.scan.unwrap();

        assert_eq!(scan.concurrency, Some(40)); // Higher wins
        assert_eq!(scan.pause.as_deref(), Some("30s")); // Higher wins
        assert_eq!(scan.marker.as_deref(), Some("old-marker")); // Lower preserved
        assert_eq!(merged.files.unwrap().input.as_deref(), Some("global.txt"));
    }

    #[test]
    fn test_env_config_parses_values() {
        let vars: HashMap<&str, &str> = [
            ("MS_MARKER", "acme-widget"),
            ("MS_TIMEOUT", "3s"),
            ("MS_RATE_BASE", "50ms"),
            ("MS_PAUSE", "1m"),
            ("MS_CONCURRENCY", "64"),
            ("MS_MAX_RETRIES", "0"),
            ("MS_INPUT", "list.txt"),
        ]
        .into_iter()
        .collect();

        let env_config = EnvConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(env_config.marker.as_deref(), Some("acme-widget"));
        assert_eq!(env_config.timeout, Some(Duration::from_secs(3)));
        assert_eq!(env_config.rate_base, Some(Duration::from_millis(50)));
        assert_eq!(env_config.rate_jitter, None);
        assert_eq!(env_config.pause, Some(Duration::from_secs(60)));
        assert_eq!(env_config.concurrency, Some(64));
        assert_eq!(env_config.max_timeout_retries, Some(0));
        assert_eq!(env_config.input.as_deref(), Some("list.txt"));
        assert_eq!(env_config.output, None);
    }

    #[test]
    fn test_env_config_ignores_invalid_values() {
        let vars: HashMap<&str, &str> = [
            ("MS_TIMEOUT", "later"),
            ("MS_CONCURRENCY", "5000"),
            ("MS_MAX_RETRIES", "many"),
            ("MS_MARKER", "   "),
        ]
        .into_iter()
        .collect();

        let env_config = EnvConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(env_config, EnvConfig::default());
    }
}
