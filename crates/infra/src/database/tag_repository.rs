//! Tag repository implementation
//!
//! Tags attach to unscoped series; the scope of a key is not stored.

use std::sync::Arc;

use async_trait::async_trait;
use mtr_common::storage::{SqliteConnection, StorageResult};
use mtr_core::TagRepository;
use mtr_domain::{Result, SeriesKey};
use rusqlite::{params, TransactionBehavior};

use super::manager::DbManager;

pub struct SqliteTagRepository {
    db: Arc<DbManager>,
}

impl SqliteTagRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TagRepository for SqliteTagRepository {
    async fn add_tag(&self, series: SeriesKey, tag: &str) -> Result<bool> {
        let tag = tag.to_string();
        self.db.blocking(move |conn| insert_series_tag(conn, series, &tag)).await
    }

    async fn remove_tag(&self, series: SeriesKey, tag: &str) -> Result<bool> {
        let tag = tag.to_string();
        self.db.blocking(move |conn| delete_series_tag(conn, series, &tag)).await
    }

    async fn tags_for(&self, series: SeriesKey) -> Result<Vec<String>> {
        self.db.blocking(move |conn| query_series_tags(conn, series)).await
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn insert_series_tag(
    conn: &mut SqliteConnection,
    series: SeriesKey,
    tag: &str,
) -> StorageResult<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute("INSERT OR IGNORE INTO tag (name) VALUES (?1)", params![tag])?;
    let tag_pk: i64 =
        tx.query_row("SELECT pk FROM tag WHERE name = ?1", params![tag], |row| row.get(0))?;
    let attached = tx.execute(
        "INSERT OR IGNORE INTO series_tag (tag_pk, entity_pk, type_pk) VALUES (?1, ?2, ?3)",
        params![tag_pk, series.entity_pk.get(), series.type_pk.get()],
    )?;
    tx.commit()?;
    Ok(attached > 0)
}

fn delete_series_tag(
    conn: &SqliteConnection,
    series: SeriesKey,
    tag: &str,
) -> StorageResult<bool> {
    let removed = conn.execute(
        "DELETE FROM series_tag \
         WHERE tag_pk = (SELECT pk FROM tag WHERE name = ?1) AND entity_pk = ?2 AND type_pk = ?3",
        params![tag, series.entity_pk.get(), series.type_pk.get()],
    )?;
    Ok(removed > 0)
}

fn query_series_tags(conn: &SqliteConnection, series: SeriesKey) -> StorageResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM series_tag st JOIN tag t ON t.pk = st.tag_pk \
         WHERE st.entity_pk = ?1 AND st.type_pk = ?2 ORDER BY t.name ASC",
    )?;
    stmt.query_map(params![series.entity_pk.get(), series.type_pk.get()], |row| row.get(0))
}
