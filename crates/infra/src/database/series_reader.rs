//! Read side of committed series data

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mtr_common::storage::{SqliteConnection, StorageResult};
use mtr_core::SeriesReader;
use mtr_domain::{Bucket, BucketKey, LatestValue, Resolution, Result, SeriesKey};
use rusqlite::params;

use super::codec::{
    aggregate_from_row, bucket_table, scope_column, time_from_millis, time_from_secs,
};
use super::manager::DbManager;

pub struct SqliteSeriesReader {
    db: Arc<DbManager>,
}

impl SqliteSeriesReader {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SeriesReader for SqliteSeriesReader {
    async fn latest(&self, series: SeriesKey) -> Result<Option<LatestValue>> {
        self.db.blocking(move |conn| query_latest(conn, series)).await
    }

    async fn buckets(
        &self,
        series: SeriesKey,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bucket>> {
        self.db.blocking(move |conn| query_buckets(conn, series, resolution, from, to)).await
    }
}

fn query_latest(
    conn: &SqliteConnection,
    series: SeriesKey,
) -> StorageResult<Option<LatestValue>> {
    conn.query_opt(
        "SELECT time_ms, value FROM latest \
         WHERE entity_pk = ?1 AND type_pk = ?2 AND scope_pk = ?3",
        params![series.entity_pk.get(), series.type_pk.get(), scope_column(series)],
        |row| {
            Ok(LatestValue { series, time: time_from_millis(0, row.get(0)?)?, value: row.get(1)? })
        },
    )
}

fn query_buckets(
    conn: &SqliteConnection,
    series: SeriesKey,
    resolution: Resolution,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> StorageResult<Vec<Bucket>> {
    let sql = format!(
        "SELECT start, kind, average, total, count FROM {} \
         WHERE entity_pk = ?1 AND type_pk = ?2 AND scope_pk = ?3 AND start BETWEEN ?4 AND ?5 \
         ORDER BY start ASC",
        bucket_table(resolution)
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map(
        params![
            series.entity_pk.get(),
            series.type_pk.get(),
            scope_column(series),
            from.timestamp(),
            to.timestamp()
        ],
        |row| {
            let start = time_from_secs(0, row.get(0)?)?;
            Ok(Bucket {
                key: BucketKey { series, resolution, start },
                aggregate: aggregate_from_row(row, 1)?,
            })
        },
    )
}
