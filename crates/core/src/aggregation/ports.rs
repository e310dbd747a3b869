//! Port interfaces for bucket and latest-value storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mtr_domain::{BucketKey, BucketWrite, MtrError, Result, SampleValue, SeriesKey};

/// Result of an unconditional bucket insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new bucket row now holds the sample.
    Inserted,
    /// A bucket with this key already exists; nothing was written.
    Conflict,
}

/// Durable bucket rows keyed by [`BucketKey`].
///
/// The store must enforce uniqueness of the key: at most one concurrent
/// `try_insert` for a key may return [`InsertOutcome::Inserted`].
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Insert a fresh bucket holding only `value`.
    async fn try_insert(&self, key: &BucketKey, value: SampleValue) -> Result<InsertOutcome>;

    /// Fold `value` into the existing bucket in a single row update.
    ///
    /// Returns `Ok(false)` when no bucket with this key exists.
    async fn merge_update(&self, key: &BucketKey, value: SampleValue) -> Result<bool>;

    /// Create the bucket or merge into it.
    ///
    /// Defaults to [`insert_then_merge`]; stores with a native atomic upsert
    /// may override this.
    async fn upsert(&self, key: &BucketKey, value: SampleValue) -> Result<BucketWrite> {
        insert_then_merge(self, key, value).await
    }
}

/// Portable upsert built from [`BucketStore::try_insert`] and
/// [`BucketStore::merge_update`].
///
/// The unique key decides the race: one writer's insert wins and every other
/// writer falls back to a row-level update. If the bucket disappears between
/// the conflict and the update (a retention sweep), the insert is retried
/// once.
///
/// # Errors
/// Storage errors propagate. `Internal` if the bucket keeps vanishing and
/// reappearing across the retry.
pub async fn insert_then_merge<S>(
    store: &S,
    key: &BucketKey,
    value: SampleValue,
) -> Result<BucketWrite>
where
    S: BucketStore + ?Sized,
{
    for _ in 0..2 {
        if store.try_insert(key, value).await? == InsertOutcome::Inserted {
            return Ok(BucketWrite::Created);
        }
        if store.merge_update(key, value).await? {
            return Ok(BucketWrite::Merged);
        }
    }
    Err(MtrError::Internal(format!("bucket {key} neither insertable nor updatable")))
}

/// Latest observed value per series.
#[async_trait]
pub trait LatestStore: Send + Sync {
    /// Insert the latest row, or replace it if `time` is newer than the
    /// stored time.
    ///
    /// Returns whether the row now reflects this sample.
    async fn upsert_latest(&self, series: SeriesKey, time: DateTime<Utc>, value: f64)
        -> Result<bool>;
}
