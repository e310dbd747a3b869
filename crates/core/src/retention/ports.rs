//! Port interfaces for retention

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mtr_domain::{Resolution, Result};

#[async_trait]
pub trait RetentionStore: Send + Sync {
    /// Delete every bucket of `resolution` starting before `cutoff`.
    ///
    /// Must be idempotent; returns the number of rows removed.
    async fn delete_before(&self, resolution: Resolution, cutoff: DateTime<Utc>) -> Result<usize>;
}
