//! Configuration management module.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::job::JobOptions;
use crate::raster::LineFeed;
use crate::tprt::DEVICE_PORT;

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(AppConfig),
    /// Config file missing (first run).
    Missing,
    /// Config file exists but invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub printer: PrinterConfig,
    pub job: JobConfig,
    pub logging: LoggingConfig,
}

/// Printer network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    pub address: Ipv4Addr,
    /// UDP and TCP port (default: 9100).
    pub port: u16,
    /// Per datagram, connect and write timeout in milliseconds (default: 3000).
    pub timeout_ms: u64,
}

/// Job sequencing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub poll_interval_ms: u64,
    /// Pause after print-start, connect and session-open.
    pub settle_delay_ms: u64,
    /// Bound for every completion wait.
    pub max_polls: u32,
    /// Send the 0x0101/0x0100 session-open requests before uploading.
    pub session_open: bool,
    /// Opaque session token placed in every request.
    pub token: u32,
    /// Sub-pixel feed bytes of each raster line.
    pub line_feed: [u8; 2],
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is not set.
    pub level: String,
    /// Write a daily log file here in addition to stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl AppConfig {
    /// Get config file path (same directory as executable).
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Attempt to load config with detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => ConfigLoadResult::Loaded(config),
                    Err(e) => ConfigLoadResult::Invalid(e),
                },
                Err(e) => ConfigLoadResult::Invalid(ConfigError::Parse(e)),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.printer.address.is_unspecified() {
            return Err(ConfigError::Validation("Printer address cannot be 0.0.0.0".to_string()));
        }
        if self.printer.port == 0 {
            return Err(ConfigError::Validation("Printer port must be greater than 0".to_string()));
        }
        if self.printer.timeout_ms < 100 {
            return Err(ConfigError::Validation(
                "Printer timeout must be at least 100 ms".to_string(),
            ));
        }
        if self.job.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "Poll interval must be greater than 0".to_string(),
            ));
        }
        if self.job.max_polls < 1 {
            return Err(ConfigError::Validation("Max polls must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl PrinterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl From<&JobConfig> for JobOptions {
    fn from(config: &JobConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            max_polls: config.max_polls,
            session_open: config.session_open,
            line_feed: LineFeed(config.line_feed),
        }
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            address: Ipv4Addr::new(10, 10, 10, 31),
            port: DEVICE_PORT,
            timeout_ms: 3000,
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            settle_delay_ms: 500,
            max_polls: 240,
            session_open: true,
            token: 0,
            line_feed: LineFeed::NONE.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}
