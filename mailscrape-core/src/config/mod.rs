//! Configuration management for mailscrape
//!
//! This module provides environment- and file-based configuration with
//! defaults and validation.

use crate::delivery::ArtifactEncoding;
use crate::logging::{LogConfig, LogLevel};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Collection and artifact settings
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Command surface settings
    #[serde(default)]
    pub command: CommandConfig,

    /// Messaging provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Collection and artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Directory for transient per-request artifacts
    pub output_dir: PathBuf,

    /// Deadline for one history scan (0 disables it)
    #[serde(with = "humantime_serde")]
    pub scan_timeout: Duration,

    /// Upper bound for a requested limit
    pub max_limit: usize,

    /// Encoding used when writing the artifact
    pub artifact_encoding: ArtifactEncoding,
}

/// Command surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Accepted command prefixes
    pub prefixes: Vec<String>,

    /// Accepted command names
    pub aliases: Vec<String>,

    /// Bot username accepted in `/cmd@bot` form
    pub bot_username: Option<String>,
}

/// Messaging provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// JSON account snapshot served by the fixture provider
    pub fixture_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            output_dir: env::temp_dir().join("mailscrape"),
            scan_timeout: Duration::from_secs(600),
            max_limit: 100_000,
            artifact_encoding: ArtifactEncoding::Utf8,
        }
    }
}

impl ScrapeConfig {
    /// Scan deadline, if one is configured
    pub fn scan_deadline(&self) -> Option<Duration> {
        if self.scan_timeout.is_zero() {
            None
        } else {
            Some(self.scan_timeout)
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            prefixes: ["/", ".", ",", "!"].iter().map(|s| s.to_string()).collect(),
            aliases: vec!["scrmail".to_string(), "mailscr".to_string()],
            bot_username: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Build the logging subsystem configuration
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig::new(LogLevel::from_str(&self.level).unwrap_or_default())
            .with_timestamp(self.with_timestamp)
            .with_target(self.with_target)
            .json_format(self.json_format)
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: MAILSCRAPE_<SECTION>_<KEY>
    /// Example: MAILSCRAPE_SCRAPE_MAX_LIMIT=5000
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup, starting from defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Scrape config
        if let Some(dir) = lookup("MAILSCRAPE_SCRAPE_OUTPUT_DIR") {
            config.scrape.output_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("MAILSCRAPE_SCRAPE_SCAN_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid scan timeout: {}", e)))?;
            config.scrape.scan_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = lookup("MAILSCRAPE_SCRAPE_MAX_LIMIT") {
            config.scrape.max_limit = max
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid max limit: {}", e)))?;
        }
        if let Some(encoding) = lookup("MAILSCRAPE_SCRAPE_ARTIFACT_ENCODING") {
            config.scrape.artifact_encoding = encoding.parse().map_err(|e| {
                ConfigError::InvalidValue(format!("Invalid artifact encoding: {}", e))
            })?;
        }

        // Command config
        if let Some(bot) = lookup("MAILSCRAPE_COMMAND_BOT_USERNAME") {
            config.command.bot_username = Some(bot);
        }

        // Provider config
        if let Some(path) = lookup("MAILSCRAPE_PROVIDER_FIXTURE_PATH") {
            config.provider.fixture_path = Some(PathBuf::from(path));
        }

        // Logging config
        if let Some(level) = lookup("MAILSCRAPE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(json) = lookup("MAILSCRAPE_LOG_JSON") {
            config.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid JSON flag: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate scrape config
        if self.scrape.max_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_limit must be greater than 0".to_string(),
            ));
        }

        if self.scrape.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "output_dir must not be empty".to_string(),
            ));
        }

        // Validate command config
        if self.command.prefixes.is_empty() || self.command.prefixes.iter().any(String::is_empty) {
            return Err(ConfigError::ValidationFailed(
                "command prefixes must be non-empty".to_string(),
            ));
        }

        if self.command.aliases.is_empty()
            || self
                .command
                .aliases
                .iter()
                .any(|a| a.is_empty() || a.chars().any(char::is_whitespace))
        {
            return Err(ConfigError::ValidationFailed(
                "command aliases must be single non-empty words".to_string(),
            ));
        }

        // Validate logging config
        if LogLevel::from_str(&self.logging.level).is_none() {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}
