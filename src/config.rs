//! Configuration file support.
//!
//! Loads settings from `~/.config/nmea-fix/config.toml` on Linux
//! (or platform-appropriate location on other OSes).

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::acquire::AcquisitionPolicy;
use crate::frame::DEFAULT_MAX_LINE_LEN;
use crate::source::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};

/// Application configuration loaded from TOML file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial device (or replay file) to read from.
    pub device: Option<String>,

    /// Serial baud rate.
    pub baud_rate: u32,

    /// Per-read timeout of the transport in milliseconds.
    pub read_timeout_ms: u64,

    /// Longest line accepted before it is discarded as garbage.
    pub max_line_len: usize,

    /// Successful reads that must be exceeded before a fix is accepted.
    pub min_reads: u32,

    /// Successful reads after which an acquisition gives up.
    pub max_reads: u32,

    /// Consecutive transport failures tolerated per acquisition.
    pub max_errors: u32,

    /// Print fixes as JSON instead of a text summary.
    pub json: bool,

    /// Print statistics every N seconds (0 = never).
    pub stats_interval: u64,

    /// Enable the HTTP metrics endpoint.
    pub metrics_enabled: bool,

    /// Port for the HTTP metrics endpoint.
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let policy = AcquisitionPolicy::default();
        Self {
            device: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            min_reads: policy.min_reads,
            max_reads: policy.max_reads,
            max_errors: policy.max_errors,
            json: false,
            stats_interval: 0,
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

impl Config {
    /// Load configuration from the default config file location.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but is malformed.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("Invalid TOML in config file: {}", path.display()))
            }
            _ => Ok(Config::default()),
        }
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nmea-fix/config.toml"))
    }

    /// Validate all configuration settings.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            bail!("baud_rate must be positive");
        }
        if self.read_timeout_ms == 0 {
            bail!("read_timeout_ms must be positive");
        }
        if self.max_line_len == 0 {
            bail!("max_line_len must be positive");
        }
        if self.min_reads >= self.max_reads {
            bail!(
                "min_reads ({}) must be less than max_reads ({})",
                self.min_reads,
                self.max_reads
            );
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn policy(&self) -> AcquisitionPolicy {
        AcquisitionPolicy {
            min_reads: self.min_reads,
            max_reads: self.max_reads,
            max_errors: self.max_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.device.is_none());
        assert_eq!(config.baud_rate, 4800);
        assert_eq!(config.read_timeout(), Duration::from_millis(30_000));
        assert_eq!(config.policy(), AcquisitionPolicy::default());
        assert!(!config.metrics_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
            device = "/dev/ttyUSB0"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.device.as_deref(), Some("/dev/ttyUSB0"));
        // Other fields should use defaults
        assert_eq!(config.baud_rate, 4800);
        assert_eq!(config.max_reads, 25);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            device = "/dev/ttyACM0"
            baud_rate = 9600
            read_timeout_ms = 5000
            max_line_len = 256
            min_reads = 2
            max_reads = 10
            max_errors = 3
            json = true
            stats_interval = 60
            metrics_enabled = true
            metrics_port = 9091
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.read_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_line_len, 256);
        assert_eq!(
            config.policy(),
            AcquisitionPolicy {
                min_reads: 2,
                max_reads: 10,
                max_errors: 3,
            }
        );
        assert!(config.json);
        assert_eq!(config.stats_interval, 60);
        assert!(config.metrics_enabled);
        assert_eq!(config.metrics_port, 9091);
    }

    #[test]
    fn test_validate_rejects_bad_budgets() {
        let config = Config {
            min_reads: 10,
            max_reads: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            baud_rate: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
