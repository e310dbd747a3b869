//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_POOL_SIZE, DEFAULT_RATE_LIMIT_WINDOW_SECS,
    DEFAULT_RETENTION_CRON, DEFAULT_RETENTION_UNITS, MAX_RETENTION_DAYS,
};
use crate::types::Resolution;
use crate::{MtrError, Result};

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// How coarse-resolution buckets are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// Unconditional insert, falling back to a merging update on a
    /// uniqueness conflict.
    #[default]
    InsertThenMerge,
    /// Single-statement conditional upsert where the store supports it.
    NativeUpsert,
}

crate::impl_domain_enum_conversions!(WriteStrategy {
    InsertThenMerge => "insert_then_merge",
    NativeUpsert => "native_upsert",
});

/// Aggregation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    #[serde(default)]
    pub write_strategy: WriteStrategy,
}

/// Retention configuration
///
/// Each `keep_*` value counts units of its own resolution, so the default of
/// 1440 keeps 1440 minutes of minute buckets and 1440 days of day buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_retention_cron")]
    pub cron_expression: String,
    #[serde(default = "default_retention_units")]
    pub keep_minute: u32,
    #[serde(default = "default_retention_units")]
    pub keep_five_minute: u32,
    #[serde(default = "default_retention_units")]
    pub keep_hour: u32,
    #[serde(default = "default_retention_units")]
    pub keep_day: u32,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "mtr.db".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            rate_limit_window_secs: DEFAULT_RATE_LIMIT_WINDOW_SECS,
            write_strategy: WriteStrategy::default(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_expression: DEFAULT_RETENTION_CRON.to_string(),
            keep_minute: DEFAULT_RETENTION_UNITS,
            keep_five_minute: DEFAULT_RETENTION_UNITS,
            keep_hour: DEFAULT_RETENTION_UNITS,
            keep_day: DEFAULT_RETENTION_UNITS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

impl AggregationConfig {
    /// Rate-limit window as a duration.
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

impl RetentionConfig {
    /// Number of resolution units kept for `resolution`.
    pub const fn units(&self, resolution: Resolution) -> u32 {
        match resolution {
            Resolution::Minute => self.keep_minute,
            Resolution::FiveMinute => self.keep_five_minute,
            Resolution::Hour => self.keep_hour,
            Resolution::Day => self.keep_day,
        }
    }

    /// Retention window for `resolution`.
    pub fn window(&self, resolution: Resolution) -> chrono::Duration {
        resolution.duration() * i32::try_from(self.units(resolution)).unwrap_or(i32::MAX)
    }
}

impl Config {
    /// Reject configurations the engine cannot run with.
    ///
    /// # Errors
    /// Returns `MtrError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(MtrError::Config("database.path must not be empty".into()));
        }
        if self.database.pool_size == 0 {
            return Err(MtrError::Config("database.pool_size must be at least 1".into()));
        }
        if self.aggregation.rate_limit_window_secs == 0 {
            return Err(MtrError::Config(
                "aggregation.rate_limit_window_secs must be at least 1".into(),
            ));
        }
        for resolution in Resolution::ALL {
            if self.retention.units(resolution) == 0 {
                return Err(MtrError::Config(format!(
                    "retention for {resolution} must keep at least one bucket"
                )));
            }
            if self.retention.window(resolution) > chrono::Duration::days(MAX_RETENTION_DAYS) {
                return Err(MtrError::Config(format!(
                    "retention for {resolution} exceeds {MAX_RETENTION_DAYS} days"
                )));
            }
        }
        Ok(())
    }
}

const fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

const fn default_rate_limit_window_secs() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_SECS
}

const fn default_retention_units() -> u32 {
    DEFAULT_RETENTION_UNITS
}

const fn default_true() -> bool {
    true
}

fn default_retention_cron() -> String {
    DEFAULT_RETENTION_CRON.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
