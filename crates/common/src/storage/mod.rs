//! Storage primitives for SQLite databases
//!
//! Provides an r2d2 connection pool with per-connection pragmas, a thin
//! connection wrapper, and storage error classification.

pub mod error;
pub mod metrics;
pub mod sqlite;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use metrics::StorageMetrics;
pub use sqlite::{
    apply_connection_pragmas, SqliteConnection, SqlitePool, SqlitePoolConfig, SqliteStatement,
};
pub use types::{HealthStatus, PoolMetrics};
