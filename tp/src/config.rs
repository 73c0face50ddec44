//! TripSync configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main TripSync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server connection configuration
    pub remote: RemoteConfig,

    /// Notification polling configuration
    pub polling: PollingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if !self.remote.base_url.starts_with("http://") && !self.remote.base_url.starts_with("https://") {
            return Err(eyre::eyre!(
                "remote.base-url must start with http:// or https://, got: {}",
                self.remote.base_url
            ));
        }
        if self.remote.timeout_secs == 0 {
            return Err(eyre::eyre!("remote.timeout-secs must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .tripsync.yml
        let local_config = PathBuf::from(".tripsync.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tripsync/tripsync.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tripsync").join("tripsync.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the logging section, for use before logging is initialized
    ///
    /// Errors are swallowed here; the full load reports them once logging is up.
    pub fn load_logging(config_path: Option<&PathBuf>) -> LoggingConfig {
        Self::load(config_path).map(|config| config.logging).unwrap_or_default()
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Server connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Timeout for itinerary generation and revision in seconds
    #[serde(rename = "generation-timeout-secs")]
    pub generation_timeout_secs: u64,

    /// Maximum retries for transient failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            generation_timeout_secs: 180,
            max_retries: 3,
        }
    }
}

/// Notification polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between unread-count polls
    #[serde(rename = "notifications-secs")]
    pub notifications_secs: u64,

    /// Disable to stop background polling entirely
    pub enabled: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            notifications_secs: 30,
            enabled: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: Option<String>,

    /// Log file path override
    pub file: Option<PathBuf>,
}
