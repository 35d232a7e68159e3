//! Figment-based configuration loading and validation.

use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::dates::parse_time;
use crate::domain::models::Config;
use crate::services::recurrence::{MONTHLY_HARD_CAP, WEEKLY_HARD_CAP};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `logging.level` is not a tracing level
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// `logging.format` is not json or pretty
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// `logging.rotation` is not a known policy
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    /// `database.path` is blank
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    /// `database.max_connections` is zero
    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    /// `recurrence.lookahead_months` is zero
    #[error("Invalid lookahead_months: {0}. Must be at least 1")]
    InvalidLookahead(u32),

    /// `recurrence.weekly_cap` is zero or above the hard cap
    #[error("Invalid weekly_cap: {0}. Must be between 1 and {WEEKLY_HARD_CAP}")]
    InvalidWeeklyCap(usize),

    /// `recurrence.monthly_cap` is zero or above the hard cap
    #[error("Invalid monthly_cap: {0}. Must be between 1 and {MONTHLY_HARD_CAP}")]
    InvalidMonthlyCap(usize),

    /// `sweeper.interval_secs` is zero
    #[error("Invalid sweeper interval: {0}s. Must be at least 1")]
    InvalidSweepInterval(u64),

    /// `notifications.default_time` is not HH:MM
    #[error("Invalid default notification time: {0}. Expected HH:MM")]
    InvalidNotificationTime(String),

    /// `user_id` is blank
    #[error("User id cannot be empty")]
    EmptyUserId,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .almanac/config.yaml (project config)
    /// 3. .almanac/local.yaml (local overrides, optional)
    /// 4. Environment variables (ALMANAC_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_root(".")
    }

    /// Same as [`ConfigLoader::load`] with the `.almanac/` directory under `root`.
    pub fn load_from_root(root: impl AsRef<Path>) -> Result<Config> {
        let dir = root.as_ref().join(".almanac");
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("ALMANAC_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.user_id.trim().is_empty() {
            return Err(ConfigError::EmptyUserId);
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        let recurrence = &config.recurrence;
        if recurrence.lookahead_months == 0 {
            return Err(ConfigError::InvalidLookahead(recurrence.lookahead_months));
        }
        if recurrence.weekly_cap == 0 || recurrence.weekly_cap > WEEKLY_HARD_CAP {
            return Err(ConfigError::InvalidWeeklyCap(recurrence.weekly_cap));
        }
        if recurrence.monthly_cap == 0 || recurrence.monthly_cap > MONTHLY_HARD_CAP {
            return Err(ConfigError::InvalidMonthlyCap(recurrence.monthly_cap));
        }

        if config.sweeper.interval_secs == 0 {
            return Err(ConfigError::InvalidSweepInterval(config.sweeper.interval_secs));
        }

        if parse_time(&config.notifications.default_time).is_err() {
            return Err(ConfigError::InvalidNotificationTime(
                config.notifications.default_time.clone(),
            ));
        }

        Ok(())
    }
}
