//! Configuration management for trackbridge
//!
//! Settings come from a TOML file or from `TRACKBRIDGE_<SECTION>_<KEY>`
//! environment variables layered over the defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

const ENV_PREFIX: &str = "TRACKBRIDGE";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// Reconciliation run settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Deadline shared by every remote call of one run, fixed when the run starts
    #[serde(with = "humantime_serde")]
    pub remote_timeout: Duration,

    /// Title of the Source milestone whose sub-tasks become sprints
    pub milestone_title: String,

    /// UTC offset appended to worklog start timestamps (`+HHMM` / `-HHMM`)
    pub worklog_timezone: String,
}

/// Correlation store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub database_path: PathBuf,
    pub pool_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    pub json_format: bool,
    pub with_timestamp: bool,
    pub with_target: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(300),
            milestone_title: "Construction".to_string(),
            worklog_timezone: "+0530".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./trackbridge.db"),
            pool_size: 8,
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

fn env_var(section: &str, key: &str) -> Option<String> {
    env::var(format!("{}_{}_{}", ENV_PREFIX, section, key)).ok()
}

fn parse_env<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        reason: e.to_string(),
    })
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: TRACKBRIDGE_<SECTION>_<KEY>
    /// Example: TRACKBRIDGE_SYNC_REMOTE_TIMEOUT=2m
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let mut config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(timeout) = env_var("SYNC", "REMOTE_TIMEOUT") {
            self.sync.remote_timeout =
                humantime_serde::re::humantime::parse_duration(&timeout).map_err(|e| {
                    ConfigError::InvalidValue {
                        key: "sync.remote_timeout",
                        reason: e.to_string(),
                    }
                })?;
        }
        if let Some(title) = env_var("SYNC", "MILESTONE_TITLE") {
            self.sync.milestone_title = title;
        }
        if let Some(tz) = env_var("SYNC", "WORKLOG_TIMEZONE") {
            self.sync.worklog_timezone = tz;
        }

        if let Some(path) = env_var("STORE", "DATABASE_PATH") {
            self.store.database_path = PathBuf::from(path);
        }
        if let Some(size) = env_var("STORE", "POOL_SIZE") {
            self.store.pool_size = parse_env("store.pool_size", &size)?;
        }

        if let Some(level) = env_var("LOG", "LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = env_var("LOG", "JSON") {
            self.logging.json_format = parse_env("logging.json_format", &json)?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.remote_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "remote_timeout must be greater than 0".to_string(),
            ));
        }

        if self.sync.milestone_title.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "milestone_title must not be empty".to_string(),
            ));
        }

        if !is_utc_offset(&self.sync.worklog_timezone) {
            return Err(ConfigError::ValidationFailed(format!(
                "worklog_timezone must look like +0530, got '{}'",
                self.sync.worklog_timezone
            )));
        }

        if self.store.pool_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "pool_size must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}

fn is_utc_offset(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 5
        && (bytes[0] == b'+' || bytes[0] == b'-')
        && bytes[1..].iter().all(u8::is_ascii_digit)
}
