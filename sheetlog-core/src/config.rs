//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/sheetlog/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/sheetlog/` (~/.config/sheetlog/)
//! - State/Logs: `$XDG_STATE_HOME/sheetlog/` (~/.local/state/sheetlog/)
//!
//! The delivery client only ever sees a [`DeliveryConfig`] value; reading
//! files is left to whoever embeds it.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Collector delivery configuration
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Delivery configuration for the log collector
///
/// Every value has a default, so an empty `[delivery]` table (or none at all)
/// targets a local listener on `https://localhost:5555/log`.
#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    /// Collector endpoint receiving probes and batches
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    /// Milliseconds between batch dispatch ticks
    #[serde(default = "default_batch_interval")]
    pub batch_interval_ms: u64,

    /// Milliseconds between change detector polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Minimum milliseconds between two accepted content captures
    #[serde(default = "default_throttle_window")]
    pub throttle_window_ms: u64,

    /// Deadline for a single probe or batch request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Ranges with more cells than this are captured as a sample only
    #[serde(default = "default_large_range_cell_limit")]
    pub large_range_cell_limit: usize,

    /// Rows and columns kept in a large-range sample
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Entries kept in the rolling activity log
    #[serde(default = "default_status_log_capacity")]
    pub status_log_capacity: usize,

    /// Accept self-signed certificates (local listeners)
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Tiered retry schedule
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            batch_interval_ms: default_batch_interval(),
            poll_interval_ms: default_poll_interval(),
            throttle_window_ms: default_throttle_window(),
            request_timeout_ms: default_request_timeout(),
            large_range_cell_limit: default_large_range_cell_limit(),
            sample_size: default_sample_size(),
            status_log_capacity: default_status_log_capacity(),
            accept_invalid_certs: false,
            retry: RetryConfig::default(),
        }
    }
}

impl DeliveryConfig {
    /// Create a configuration for the given endpoint with default timings
    pub fn with_endpoint(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Default::default()
        }
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn throttle_window(&self) -> Duration {
        Duration::from_millis(self.throttle_window_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.endpoint_url.trim().is_empty() {
            return Err(Error::Config(
                "delivery.endpoint_url must not be empty".to_string(),
            ));
        }
        reqwest::Url::parse(&self.endpoint_url).map_err(|e| {
            Error::Config(format!(
                "delivery.endpoint_url is not a valid URL ({}): {}",
                self.endpoint_url, e
            ))
        })?;

        let intervals = [
            ("delivery.batch_interval_ms", self.batch_interval_ms),
            ("delivery.poll_interval_ms", self.poll_interval_ms),
            ("delivery.throttle_window_ms", self.throttle_window_ms),
            ("delivery.request_timeout_ms", self.request_timeout_ms),
            ("delivery.retry.tier1_interval_ms", self.retry.tier1_interval_ms),
            ("delivery.retry.tier2_interval_ms", self.retry.tier2_interval_ms),
            ("delivery.retry.tier3_interval_ms", self.retry.tier3_interval_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(Error::Config(format!("{} must be greater than 0", name)));
        }

        if self.large_range_cell_limit == 0 || self.sample_size == 0 {
            return Err(Error::Config(
                "delivery.large_range_cell_limit and delivery.sample_size must be greater than 0"
                    .to_string(),
            ));
        }
        if self.status_log_capacity == 0 {
            return Err(Error::Config(
                "delivery.status_log_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_endpoint_url() -> String {
    "https://localhost:5555/log".to_string()
}

fn default_batch_interval() -> u64 {
    1000
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_throttle_window() -> u64 {
    200
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_large_range_cell_limit() -> usize {
    100
}

fn default_sample_size() -> usize {
    3
}

fn default_status_log_capacity() -> usize {
    5
}

/// Retry schedule configuration
///
/// Elapsed time is measured from the first failure of the current streak:
/// probes run every `tier1_interval_ms` for `tier1_duration_ms`, then every
/// `tier2_interval_ms` for `tier2_duration_ms`, then every
/// `tier3_interval_ms` forever.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "default_tier1_interval")]
    pub tier1_interval_ms: u64,

    #[serde(default = "default_tier_duration")]
    pub tier1_duration_ms: u64,

    #[serde(default = "default_tier2_interval")]
    pub tier2_interval_ms: u64,

    #[serde(default = "default_tier_duration")]
    pub tier2_duration_ms: u64,

    #[serde(default = "default_tier3_interval")]
    pub tier3_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            tier1_interval_ms: default_tier1_interval(),
            tier1_duration_ms: default_tier_duration(),
            tier2_interval_ms: default_tier2_interval(),
            tier2_duration_ms: default_tier_duration(),
            tier3_interval_ms: default_tier3_interval(),
        }
    }
}

fn default_tier1_interval() -> u64 {
    1000
}

fn default_tier2_interval() -> u64 {
    3000
}

fn default_tier3_interval() -> u64 {
    60_000
}

fn default_tier_duration() -> u64 {
    15 * 60 * 1000
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.delivery.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/sheetlog/config.toml` (~/.config/sheetlog/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("sheetlog").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/sheetlog/` (~/.local/state/sheetlog/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("sheetlog")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_config_defaults() {
        let config = DeliveryConfig::default();
        assert_eq!(config.endpoint_url, "https://localhost:5555/log");
        assert_eq!(config.batch_interval(), Duration::from_millis(1000));
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.throttle_window(), Duration::from_millis(200));
        assert_eq!(config.large_range_cell_limit, 100);
        assert_eq!(config.sample_size, 3);
        assert_eq!(config.status_log_capacity, 5);
        assert!(!config.accept_invalid_certs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_config_defaults() {
        let retry = RetryConfig::default();
        assert_eq!(retry.tier1_interval_ms, 1000);
        assert_eq!(retry.tier1_duration_ms, 15 * 60 * 1000);
        assert_eq!(retry.tier2_interval_ms, 3000);
        assert_eq!(retry.tier2_duration_ms, 15 * 60 * 1000);
        assert_eq!(retry.tier3_interval_ms, 60_000);
    }

    #[test]
    fn test_delivery_config_validation() {
        let config = DeliveryConfig::with_endpoint("");
        assert!(config.validate().is_err());

        let config = DeliveryConfig::with_endpoint("not a url");
        assert!(config.validate().is_err());

        let config = DeliveryConfig {
            batch_interval_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_interval_ms"));

        let mut config = DeliveryConfig::default();
        config.retry.tier3_interval_ms = 0;
        assert!(config.validate().is_err());

        let config = DeliveryConfig {
            status_log_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DeliveryConfig::with_endpoint("http://127.0.0.1:8080/log");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[delivery]
endpoint_url = "http://collector.internal:9000/log"
batch_interval_ms = 500
accept_invalid_certs = true

[delivery.retry]
tier3_interval_ms = 120000

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.delivery.endpoint_url,
            "http://collector.internal:9000/log"
        );
        assert_eq!(config.delivery.batch_interval_ms, 500);
        assert_eq!(config.delivery.poll_interval_ms, 1000);
        assert!(config.delivery.accept_invalid_certs);
        assert_eq!(config.delivery.retry.tier3_interval_ms, 120_000);
        assert_eq!(config.delivery.retry.tier1_interval_ms, 1000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[delivery]\nthrottle_window_ms = 350\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.delivery.throttle_window_ms, 350);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[delivery]\nendpoint_url = \"\"\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
