//! Latest-value repository
//!
//! The conditional upsert only replaces a stored value when the incoming
//! time is strictly newer, so out-of-order arrivals never move the latest
//! value backwards.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mtr_common::storage::{SqliteConnection, StorageResult};
use mtr_core::LatestStore;
use mtr_domain::{Result, SeriesKey};
use rusqlite::params;

use super::codec::scope_column;
use super::manager::DbManager;

pub struct SqliteLatestRepository {
    db: Arc<DbManager>,
}

impl SqliteLatestRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LatestStore for SqliteLatestRepository {
    async fn upsert_latest(
        &self,
        series: SeriesKey,
        time: DateTime<Utc>,
        value: f64,
    ) -> Result<bool> {
        self.db.blocking(move |conn| upsert_latest(conn, series, time, value)).await
    }
}

fn upsert_latest(
    conn: &SqliteConnection,
    series: SeriesKey,
    time: DateTime<Utc>,
    value: f64,
) -> StorageResult<bool> {
    let changed = conn.execute(
        "INSERT INTO latest (entity_pk, type_pk, scope_pk, time_ms, value) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT (entity_pk, type_pk, scope_pk) DO UPDATE \
         SET time_ms = excluded.time_ms, value = excluded.value \
         WHERE excluded.time_ms > latest.time_ms",
        params![
            series.entity_pk.get(),
            series.type_pk.get(),
            scope_column(series),
            time.timestamp_millis(),
            value
        ],
    )?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mtr_domain::Pk;
    use tempfile::TempDir;

    use super::*;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).expect("valid timestamp")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn only_newer_samples_replace_latest() {
        let dir = TempDir::new().expect("temp dir created");
        let manager = Arc::new(
            DbManager::new(dir.path().join("latest.db"), 2, Duration::from_secs(5))
                .expect("manager created"),
        );
        manager.run_migrations().expect("migrations run");
        let repo = SqliteLatestRepository::new(Arc::clone(&manager));
        let series = SeriesKey::new(Pk(1), Pk(1));

        assert!(repo.upsert_latest(series, at(2_000), 2.0).await.expect("first"));
        assert!(!repo.upsert_latest(series, at(1_000), 1.0).await.expect("older"));
        assert!(!repo.upsert_latest(series, at(2_000), 5.0).await.expect("same time"));
        assert!(repo.upsert_latest(series, at(2_001), 3.0).await.expect("newer"));

        let conn = manager.get_connection().expect("connection");
        let (time_ms, value): (i64, f64) = conn
            .query_row("SELECT time_ms, value FROM latest", &[], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .expect("latest row");
        assert_eq!((time_ms, value), (2_001, 3.0));
    }
}
