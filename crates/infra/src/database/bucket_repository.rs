//! Bucket repository implementation
//!
//! Buckets live in one table per resolution, keyed by
//! `(entity_pk, type_pk, scope_pk, start)`. The primary key is what makes
//! insert-then-merge safe: of any number of concurrent inserts for the same
//! key exactly one succeeds, and every merge is a single-row `UPDATE` whose
//! right-hand side reads the committed row.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mtr_common::storage::{SqliteConnection, StorageResult};
use mtr_core::aggregation::insert_then_merge;
use mtr_core::{BucketStore, InsertOutcome, RetentionStore};
use mtr_domain::{Bucket, BucketKey, BucketWrite, Resolution, Result, SampleValue, WriteStrategy};
use rusqlite::params;
use tracing::{debug, instrument};

use super::codec::{aggregate_from_row, bucket_table, first_columns, scope_column};
use super::manager::DbManager;

/// SQLite-backed bucket rows for every resolution.
pub struct SqliteBucketRepository {
    db: Arc<DbManager>,
    strategy: WriteStrategy,
}

impl SqliteBucketRepository {
    /// Repository using the portable insert-then-merge upsert.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self::with_strategy(db, WriteStrategy::InsertThenMerge)
    }

    pub fn with_strategy(db: Arc<DbManager>, strategy: WriteStrategy) -> Self {
        Self { db, strategy }
    }

    pub fn strategy(&self) -> WriteStrategy {
        self.strategy
    }

    /// Point read of one bucket.
    pub async fn get(&self, key: &BucketKey) -> Result<Option<Bucket>> {
        let key = *key;
        self.db.blocking(move |conn| query_bucket(conn, &key)).await
    }
}

#[async_trait]
impl BucketStore for SqliteBucketRepository {
    async fn try_insert(&self, key: &BucketKey, value: SampleValue) -> Result<InsertOutcome> {
        let key = *key;
        self.db.blocking(move |conn| insert_bucket(conn, &key, value)).await
    }

    async fn merge_update(&self, key: &BucketKey, value: SampleValue) -> Result<bool> {
        let key = *key;
        self.db.blocking(move |conn| merge_bucket(conn, &key, value)).await
    }

    #[instrument(skip(self, value), fields(strategy = %self.strategy))]
    async fn upsert(&self, key: &BucketKey, value: SampleValue) -> Result<BucketWrite> {
        match self.strategy {
            WriteStrategy::InsertThenMerge => insert_then_merge(self, key, value).await,
            WriteStrategy::NativeUpsert => {
                let key = *key;
                self.db.blocking(move |conn| upsert_bucket(conn, &key, value)).await
            }
        }
    }
}

#[async_trait]
impl RetentionStore for SqliteBucketRepository {
    async fn delete_before(&self, resolution: Resolution, cutoff: DateTime<Utc>) -> Result<usize> {
        self.db.blocking(move |conn| delete_buckets_before(conn, resolution, cutoff)).await
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn insert_bucket(
    conn: &SqliteConnection,
    key: &BucketKey,
    value: SampleValue,
) -> StorageResult<InsertOutcome> {
    let (kind, average, total, count) = first_columns(value);
    let sql = format!(
        "INSERT INTO {} (entity_pk, type_pk, start, kind, average, total, count, scope_pk) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        bucket_table(key.resolution)
    );

    match conn.execute(
        &sql,
        params![
            key.series.entity_pk.get(),
            key.series.type_pk.get(),
            key.start.timestamp(),
            kind,
            average,
            total,
            count,
            scope_column(key.series)
        ],
    ) {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(err) if err.is_unique_violation() => {
            debug!(%key, "bucket already exists");
            Ok(InsertOutcome::Conflict)
        }
        Err(err) => Err(err),
    }
}

/// Single-statement merge; the new aggregate is computed from the row as it
/// is at update time.
fn merge_bucket(
    conn: &SqliteConnection,
    key: &BucketKey,
    value: SampleValue,
) -> StorageResult<bool> {
    let table = bucket_table(key.resolution);
    let entity_pk = key.series.entity_pk.get();
    let type_pk = key.series.type_pk.get();
    let start = key.start.timestamp();
    let scope_pk = scope_column(key.series);
    let filter = "WHERE entity_pk = ?1 AND type_pk = ?2 AND start = ?3 AND scope_pk = ?4";

    let changed = match value {
        SampleValue::Gauge { value } => conn.execute(
            &format!(
                "UPDATE {table} SET average = (?5 + average * count) / (count + 1), \
                 count = count + 1 {filter} AND kind = 'gauge'"
            ),
            params![entity_pk, type_pk, start, scope_pk, value],
        )?,
        SampleValue::Counter { count } => conn.execute(
            &format!("UPDATE {table} SET count = count + ?5 {filter} AND kind = 'counter'"),
            params![entity_pk, type_pk, start, scope_pk, count],
        )?,
        SampleValue::Timer { total, count } => conn.execute(
            &format!(
                "UPDATE {table} SET total = total + ?5, count = count + ?6 \
                 {filter} AND kind = 'timer'"
            ),
            params![entity_pk, type_pk, start, scope_pk, total, count],
        )?,
    };

    Ok(changed > 0)
}

/// Native `INSERT .. ON CONFLICT DO UPDATE`, with the same merge rules as
/// [`merge_bucket`].
fn upsert_bucket(
    conn: &SqliteConnection,
    key: &BucketKey,
    value: SampleValue,
) -> StorageResult<BucketWrite> {
    let merge = match value {
        SampleValue::Gauge { .. } => {
            "average = (excluded.average + average * count) / (count + 1), count = count + 1"
        }
        SampleValue::Counter { .. } => "count = count + excluded.count",
        SampleValue::Timer { .. } => {
            "total = total + excluded.total, count = count + excluded.count"
        }
    };
    let (kind, average, total, count) = first_columns(value);
    let sql = format!(
        "INSERT INTO {} (entity_pk, type_pk, start, kind, average, total, count, scope_pk) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
         ON CONFLICT (entity_pk, type_pk, scope_pk, start) DO UPDATE SET {merge}",
        bucket_table(key.resolution)
    );

    conn.execute(
        &sql,
        params![
            key.series.entity_pk.get(),
            key.series.type_pk.get(),
            key.start.timestamp(),
            kind,
            average,
            total,
            count,
            scope_column(key.series)
        ],
    )?;
    Ok(BucketWrite::Upserted)
}

fn query_bucket(conn: &SqliteConnection, key: &BucketKey) -> StorageResult<Option<Bucket>> {
    let sql = format!(
        "SELECT kind, average, total, count FROM {} \
         WHERE entity_pk = ?1 AND type_pk = ?2 AND start = ?3 AND scope_pk = ?4",
        bucket_table(key.resolution)
    );
    let key = *key;
    conn.query_opt(
        &sql,
        params![
            key.series.entity_pk.get(),
            key.series.type_pk.get(),
            key.start.timestamp(),
            scope_column(key.series)
        ],
        |row| Ok(Bucket { key, aggregate: aggregate_from_row(row, 0)? }),
    )
}

fn delete_buckets_before(
    conn: &SqliteConnection,
    resolution: Resolution,
    cutoff: DateTime<Utc>,
) -> StorageResult<usize> {
    let sql = format!("DELETE FROM {} WHERE start < ?1", bucket_table(resolution));
    conn.execute(&sql, params![cutoff.timestamp()])
}
