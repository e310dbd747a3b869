//! Engine constants
//!
//! Defaults shared by configuration, aggregation and retention.

/// Default rate-limit window for raw-resolution buckets.
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Default number of resolution units each bucket table retains.
pub const DEFAULT_RETENTION_UNITS: u32 = 1440;

/// Longest retention window any resolution may be configured with.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Default retention sweep schedule (every minute, on the minute).
pub const DEFAULT_RETENTION_CRON: &str = "0 * * * * *";

/// Default connection pool size.
pub const DEFAULT_POOL_SIZE: u32 = 8;

/// Default SQLite busy timeout.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Upper bound on identifier length accepted from reporters.
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Upper bound on tag length.
pub const MAX_TAG_LENGTH: usize = 128;
