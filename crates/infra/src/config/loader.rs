//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Attempt to load from environment variables (`MTR_DB_PATH` must be set)
//! 2. Otherwise fall back to a config file, probing standard locations
//! 3. JSON and TOML are both accepted, detected by extension
//!
//! Whatever the source, the result is validated before it is returned.
//!
//! ## Environment Variables
//! - `MTR_DB_PATH`: database file path (required for env loading)
//! - `MTR_DB_POOL_SIZE`: connection pool size
//! - `MTR_DB_BUSY_TIMEOUT_MS`: SQLite busy timeout
//! - `MTR_RATE_LIMIT_WINDOW_SECS`: raw-resolution rate-limit window
//! - `MTR_WRITE_STRATEGY`: `insert_then_merge` or `native_upsert`
//! - `MTR_RETENTION_ENABLED`: whether the retention sweeper runs
//! - `MTR_RETENTION_CRON`: retention sweep schedule (6-field cron)
//! - `MTR_RETENTION_KEEP_{MINUTE,FIVE_MINUTE,HOUR,DAY}`: buckets kept
//! - `MTR_LOG_LEVEL`: default log filter
//! - `MTR_LOG_JSON`: emit JSON logs (true/false)
//!
//! ## File Locations
//! `config.{json,toml}` and `mtr.{json,toml}` in the working directory and
//! up to two parents, then the same names next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use mtr_domain::{
    AggregationConfig, Config, DatabaseConfig, LoggingConfig, MtrError, Result, RetentionConfig,
};

/// Load configuration, preferring the environment over files.
///
/// # Errors
/// Returns `MtrError::Config` if neither source yields a valid
/// configuration.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables.
///
/// Only `MTR_DB_PATH` is required; every other setting falls back to its
/// default.
///
/// # Errors
/// Returns `MtrError::Config` if `MTR_DB_PATH` is missing or any present
/// variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let defaults = Config::default();

    let database = DatabaseConfig {
        path: env_var("MTR_DB_PATH")?,
        pool_size: env_parse("MTR_DB_POOL_SIZE", defaults.database.pool_size)?,
        busy_timeout_ms: env_parse("MTR_DB_BUSY_TIMEOUT_MS", defaults.database.busy_timeout_ms)?,
    };

    let aggregation = AggregationConfig {
        rate_limit_window_secs: env_parse(
            "MTR_RATE_LIMIT_WINDOW_SECS",
            defaults.aggregation.rate_limit_window_secs,
        )?,
        write_strategy: env_parse("MTR_WRITE_STRATEGY", defaults.aggregation.write_strategy)?,
    };

    let retention = RetentionConfig {
        enabled: env_bool("MTR_RETENTION_ENABLED", defaults.retention.enabled),
        cron_expression: std::env::var("MTR_RETENTION_CRON")
            .unwrap_or(defaults.retention.cron_expression),
        keep_minute: env_parse("MTR_RETENTION_KEEP_MINUTE", defaults.retention.keep_minute)?,
        keep_five_minute: env_parse(
            "MTR_RETENTION_KEEP_FIVE_MINUTE",
            defaults.retention.keep_five_minute,
        )?,
        keep_hour: env_parse("MTR_RETENTION_KEEP_HOUR", defaults.retention.keep_hour)?,
        keep_day: env_parse("MTR_RETENTION_KEEP_DAY", defaults.retention.keep_day)?,
    };

    let logging = LoggingConfig {
        level: std::env::var("MTR_LOG_LEVEL").unwrap_or(defaults.logging.level),
        json: env_bool("MTR_LOG_JSON", defaults.logging.json),
    };

    let config = Config { database, aggregation, retention, logging };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes the standard locations via
/// [`probe_config_paths`].
///
/// # Errors
/// Returns `MtrError::Config` if the file is missing, unreadable, malformed,
/// or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(MtrError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            MtrError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| MtrError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration, choosing the format by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| MtrError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| MtrError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(MtrError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["config.json", "config.toml", "mtr.json", "mtr.toml"];
    const PREFIXES: [&str; 3] = ["", "..", "../.."];

    let mut bases = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        bases.push(cwd);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            bases.push(exe_dir.to_path_buf());
        }
    }

    bases
        .iter()
        .flat_map(|base| {
            PREFIXES.iter().flat_map(move |prefix| {
                NAMES.iter().map(move |name| base.join(prefix).join(name))
            })
        })
        .find(|candidate| candidate.exists())
}

/// Get a required environment variable.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| MtrError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional environment variable, falling back to `default`.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| MtrError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
