//! Error types used throughout the engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the engine
///
/// Validation and rate-limit outcomes are expected results of the ingestion
/// protocol; everything else is an internal failure of the durable store or
/// the process itself.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum MtrError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification surfaced to the boundary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    RateLimited,
    NotFound,
    Internal,
}

impl ErrorKind {
    /// Client-side outcomes (4xx at the boundary) as opposed to internal
    /// failures (5xx).
    pub const fn is_client_error(self) -> bool {
        !matches!(self, Self::Internal)
    }
}

impl MtrError {
    /// Classify this error for the boundary layer.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Prefix internal failures with the operation (and key) that produced
    /// them. Client-facing messages are left untouched so they reach the
    /// caller verbatim.
    #[must_use]
    pub fn context(self, operation: impl std::fmt::Display) -> Self {
        match self {
            Self::Database(msg) => Self::Database(format!("{operation}: {msg}")),
            Self::Internal(msg) => Self::Internal(format!("{operation}: {msg}")),
            other => other,
        }
    }

    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, MtrError>;
