//! Configuration management for instance-manager.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::manager::ManagerConfig;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session timeout defaults.
    pub timeouts: TimeoutSection,
    /// Logging configuration.
    pub logging: LoggingSection,
    /// Demo run settings.
    pub demo: DemoSection,
}

/// Session timeout section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSection {
    /// Inactivity timeout in seconds.
    pub idle_secs: u64,
    /// Absolute session lifetime in seconds.
    pub hard_secs: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            idle_secs: 180,
            hard_secs: 600,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Demo run section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSection {
    /// Number of pages to paginate.
    pub pages: usize,
    /// Owner of the demo session.
    pub owner: u64,
}

impl Default for DemoSection {
    fn default() -> Self {
        Self { pages: 5, owner: 1 }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Some(secs) = env_secs("INSTANCE_MANAGER_IDLE_SECS") {
            self.timeouts.idle_secs = secs;
        }

        if let Some(secs) = env_secs("INSTANCE_MANAGER_HARD_SECS") {
            self.timeouts.hard_secs = secs;
        }

        if let Ok(level) = std::env::var("INSTANCE_MANAGER_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(secs) = args.idle_secs {
            self.timeouts.idle_secs = secs;
        }

        if let Some(secs) = args.hard_secs {
            self.timeouts.hard_secs = secs;
        }

        if let Some(pages) = args.pages {
            self.demo.pages = pages;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to the manager's timeout defaults.
    ///
    /// A hard timeout shorter than the idle timeout is allowed; the hard
    /// timer simply wins.
    pub fn manager_config(&self) -> Result<ManagerConfig, ConfigError> {
        if self.timeouts.idle_secs == 0 {
            return Err(ConfigError::InvalidTimeout("idle_secs"));
        }
        if self.timeouts.hard_secs == 0 {
            return Err(ConfigError::InvalidTimeout("hard_secs"));
        }

        Ok(ManagerConfig {
            idle_timeout: Duration::from_secs(self.timeouts.idle_secs),
            hard_timeout: Duration::from_secs(self.timeouts.hard_secs),
        })
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

fn env_secs(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// A timeout was configured as zero.
    InvalidTimeout(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidTimeout(field) => write!(f, "timeout {} must be greater than zero", field),
        }
    }
}

impl std::error::Error for ConfigError {}
