//! Conversions from external infrastructure errors into domain errors.

use mtr_common::storage::StorageError;
use mtr_common::{ErrorClassification, ErrorSeverity};
use mtr_domain::MtrError;
use rusqlite::Error as SqlError;
use tokio::task::JoinError;
use tracing::{debug, error, warn};

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub MtrError);

impl From<InfraError> for MtrError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<MtrError> for InfraError {
    fn from(value: MtrError) -> Self {
        InfraError(value)
    }
}

impl std::fmt::Display for InfraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

trait IntoMtrError {
    fn into_mtr(self) -> MtrError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → MtrError */
/* -------------------------------------------------------------------------- */

impl IntoMtrError for SqlError {
    fn into_mtr(self) -> MtrError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => MtrError::Database("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => {
                        MtrError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        MtrError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        MtrError::Database("foreign key constraint violation".into())
                    }
                    (ErrorCode::DiskFull, _) => MtrError::Database("database disk is full".into()),
                    _ => MtrError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => MtrError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                MtrError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                MtrError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => MtrError::Database("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidPath(path) => {
                MtrError::Database(format!("invalid database path: {}", path.to_string_lossy()))
            }
            RE::InvalidQuery => MtrError::Database("invalid SQL query".into()),
            other => MtrError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_mtr())
    }
}

/* -------------------------------------------------------------------------- */
/* StorageError → MtrError */
/* -------------------------------------------------------------------------- */

impl IntoMtrError for StorageError {
    fn into_mtr(self) -> MtrError {
        match self {
            StorageError::Rusqlite(sql_err) => sql_err.into_mtr(),
            StorageError::Timeout(seconds) => {
                MtrError::Database(format!("timed out after {seconds}s waiting for a connection"))
            }
            StorageError::PoolExhausted => MtrError::Database("connection pool exhausted".into()),
            StorageError::Connection(message)
            | StorageError::Query(message)
            | StorageError::Migration(message) => MtrError::Database(message),
            StorageError::InvalidConfig(message) => MtrError::Config(message),
            StorageError::SchemaVersionMismatch { expected, found } => MtrError::Database(
                format!("schema version mismatch (expected {expected}, found {found})"),
            ),
            StorageError::Io(io_err) => MtrError::Database(io_err.to_string()),
            StorageError::R2d2(r2d2_err) => MtrError::Database(r2d2_err.to_string()),
        }
    }
}

impl From<StorageError> for InfraError {
    fn from(value: StorageError) -> Self {
        InfraError(value.into_mtr())
    }
}

/* -------------------------------------------------------------------------- */
/* tokio::task::JoinError → MtrError */
/* -------------------------------------------------------------------------- */

impl IntoMtrError for JoinError {
    fn into_mtr(self) -> MtrError {
        if self.is_cancelled() {
            MtrError::Internal("blocking task cancelled".into())
        } else {
            MtrError::Internal(format!("blocking task failed: {self}"))
        }
    }
}

impl From<JoinError> for InfraError {
    fn from(value: JoinError) -> Self {
        InfraError(value.into_mtr())
    }
}

/// Map a storage failure from inside a blocking repository call.
///
/// Uniqueness races are expected and handled by callers, so they are not
/// logged here.
pub fn map_storage_error(err: StorageError) -> MtrError {
    if !err.is_unique_violation() {
        let retryable = err.is_retryable();
        match err.severity() {
            ErrorSeverity::Critical => error!(error = %err, "critical storage failure"),
            ErrorSeverity::Error => warn!(error = %err, retryable, "storage failure"),
            ErrorSeverity::Warning | ErrorSeverity::Info => {
                debug!(error = %err, retryable, "transient storage failure");
            }
        }
    }
    err.into_mtr()
}

/// Map a failed `spawn_blocking` join.
pub fn map_join_error(err: JoinError) -> MtrError {
    err.into_mtr()
}
