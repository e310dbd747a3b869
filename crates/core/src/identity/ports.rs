//! Port interfaces for identity storage

use async_trait::async_trait;
use mtr_domain::{EntityKind, Pk, Result};

/// Durable identity rows, one key space per [`EntityKind`].
///
/// Implementations must enforce uniqueness of `id` within a kind and must
/// never hand out a deleted key again.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Point lookup by external identifier.
    async fn find(&self, kind: EntityKind, id: &str) -> Result<Option<Pk>>;

    /// Insert a new identity row.
    ///
    /// Returns `Ok(false)` when a row for `id` already exists; losing a
    /// duplicate-insert race is not an error.
    async fn insert(&self, kind: EntityKind, id: &str) -> Result<bool>;

    /// Delete the identity and everything recorded against it.
    ///
    /// Returns `Ok(false)` when no row existed.
    async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool>;
}
