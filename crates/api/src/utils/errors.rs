//! Error labelling for the boundary layer

use mtr_domain::{ErrorKind, MtrError};
use tracing::{debug, error, warn};

/// Stable label for metrics and logs.
#[inline]
pub const fn error_label(error: &MtrError) -> &'static str {
    match error {
        MtrError::Validation(_) => "validation",
        MtrError::RateLimited(_) => "rate_limited",
        MtrError::NotFound(_) => "not_found",
        MtrError::Database(_) => "database",
        MtrError::Config(_) => "config",
        MtrError::Internal(_) => "internal",
    }
}

/// HTTP status an outer layer should answer with.
pub const fn status_code(error: &MtrError) -> u16 {
    match error.kind() {
        ErrorKind::Validation => 400,
        ErrorKind::NotFound => 404,
        ErrorKind::RateLimited => 429,
        ErrorKind::Internal => 500,
    }
}

/// Log a failed operation at the level its kind deserves.
///
/// Rate limiting is routine and logs at debug; other client errors at warn;
/// internal failures at error.
pub fn log_failure(operation: &str, error: &MtrError) {
    let label = error_label(error);
    match error.kind() {
        ErrorKind::RateLimited => debug!(operation, label, %error, "operation rate limited"),
        kind if kind.is_client_error() => warn!(operation, label, %error, "operation rejected"),
        _ => error!(operation, label, %error, "operation failed"),
    }
}
