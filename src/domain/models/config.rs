//! Application configuration tree.

use serde::{Deserialize, Serialize};

/// Main configuration structure for Almanac
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Owner recorded on tasks created from this installation
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Recurrence expansion limits
    #[serde(default)]
    pub recurrence: RecurrenceConfig,

    /// Missed-task sweeper configuration
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Lifecycle controller configuration
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Reminder configuration
    #[serde(default)]
    pub notifications: NotificationConfig,
}

fn default_user_id() -> String {
    "local".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            recurrence: RecurrenceConfig::default(),
            sweeper: SweeperConfig::default(),
            lifecycle: LifecycleConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".almanac/almanac.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation for file output: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Recurrence expansion limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RecurrenceConfig {
    /// Lookahead window when a repeating task has no due date
    #[serde(default = "default_lookahead_months")]
    pub lookahead_months: u32,

    /// Maximum weekly occurrences (at most 52)
    #[serde(default = "default_weekly_cap")]
    pub weekly_cap: usize,

    /// Maximum monthly occurrences (at most 24)
    #[serde(default = "default_monthly_cap")]
    pub monthly_cap: usize,
}

const fn default_lookahead_months() -> u32 {
    3
}

const fn default_weekly_cap() -> usize {
    52
}

const fn default_monthly_cap() -> usize {
    24
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            lookahead_months: default_lookahead_months(),
            weekly_cap: default_weekly_cap(),
            monthly_cap: default_monthly_cap(),
        }
    }
}

/// Missed-task sweeper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SweeperConfig {
    /// Seconds between periodic sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,

    /// Sweep immediately when the daemon starts
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

const fn default_sweep_interval_secs() -> u64 {
    300
}

const fn default_true() -> bool {
    true
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
            run_on_startup: true,
        }
    }
}

/// Lifecycle controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LifecycleConfig {
    /// How long the duplicate-submission guard stays closed after an operation finishes
    #[serde(default = "default_submit_cooldown_ms")]
    pub submit_cooldown_ms: u64,
}

const fn default_submit_cooldown_ms() -> u64 {
    500
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            submit_cooldown_ms: default_submit_cooldown_ms(),
        }
    }
}

/// Reminder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NotificationConfig {
    /// Deliver reminders at all; when off, tasks keep the flag but nothing is scheduled
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,
    /// Reminder time (HH:MM) for tasks without a scheduled time
    #[serde(default = "default_notification_time")]
    pub default_time: String,
}

const fn default_notifications_enabled() -> bool {
    true
}

fn default_notification_time() -> String {
    "09:00".to_string()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            default_time: default_notification_time(),
        }
    }
}
