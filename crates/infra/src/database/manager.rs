//! Database connection manager backed by the shared SQLite pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mtr_common::storage::{
    HealthStatus, SqliteConnection, SqlitePool, SqlitePoolConfig, StorageResult,
};
use mtr_domain::{DatabaseConfig, Result};
use rusqlite::params;
use tokio::task;
use tracing::info;

use crate::errors::{map_join_error, map_storage_error};

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Database manager that wraps an [`SqlitePool`].
#[derive(Debug)]
pub struct DbManager {
    pool: Arc<SqlitePool>,
    path: PathBuf,
}

impl DbManager {
    /// Open the database at `db_path` with the given pool size and busy
    /// timeout.
    ///
    /// # Errors
    /// `MtrError::Database` if the file cannot be opened or configured,
    /// `MtrError::Config` for a zero pool size.
    pub fn new<P: AsRef<Path>>(
        db_path: P,
        pool_size: u32,
        busy_timeout: Duration,
    ) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();

        let config =
            SqlitePoolConfig::default().with_max_size(pool_size).with_busy_timeout(busy_timeout);
        let pool = SqlitePool::new(&path, config).map_err(map_storage_error)?;

        info!(db_path = %path.display(), max_connections = pool_size, "sqlite pool initialised");

        Ok(Self { pool: Arc::new(pool), path })
    }

    /// Open the database described by `config` and bring its schema up to
    /// date.
    ///
    /// # Errors
    /// See [`Self::new`] and [`Self::run_migrations`].
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let manager = Self::new(
            &config.path,
            config.pool_size,
            Duration::from_millis(config.busy_timeout_ms),
        )?;
        manager.run_migrations()?;
        Ok(manager)
    }

    /// Borrow the underlying pool.
    pub fn pool(&self) -> &Arc<SqlitePool> {
        &self.pool
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<SqliteConnection> {
        self.pool.get_connection().map_err(map_storage_error)
    }

    /// Run `f` on a pooled connection inside `spawn_blocking`.
    ///
    /// # Errors
    /// Pool, SQL and join failures, mapped to domain errors.
    pub async fn blocking<T, F>(self: &Arc<Self>, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> StorageResult<T> + Send + 'static,
    {
        let db = Arc::clone(self);
        task::spawn_blocking(move || -> Result<T> {
            let mut conn = db.get_connection()?;
            f(&mut conn).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn).map_err(map_storage_error)?;
        info!(version = SCHEMA_VERSION, "schema migrations applied");
        Ok(())
    }

    /// Highest applied schema version.
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", &[], |row| {
            row.get(0)
        })
        .map_err(map_storage_error)
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Perform a health check to verify database connectivity.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", &[], |row| row.get::<_, i32>(0)).map_err(map_storage_error)?;
        Ok(())
    }

    /// Pool-level health snapshot.
    pub fn pool_health(&self) -> HealthStatus {
        self.pool.health_check()
    }
}

fn create_schema(conn: &SqliteConnection) -> StorageResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) \
         VALUES (?1, CAST(strftime('%s','now') AS INTEGER))",
        params![SCHEMA_VERSION],
    )?;
    Ok(())
}
