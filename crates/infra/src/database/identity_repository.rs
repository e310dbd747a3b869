//! Identity repository implementation
//!
//! One table per entity kind maps the external identifier to an
//! AUTOINCREMENT surrogate key.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mtr_common::storage::{SqliteConnection, StorageResult};
use mtr_core::IdentityStore;
use mtr_domain::{EntityKind, MetricFamily, Pk, Resolution, Result};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::codec::{bucket_table, entity_table};
use super::manager::DbManager;

/// SQLite-backed identity rows.
pub struct SqliteIdentityRepository {
    db: Arc<DbManager>,
}

impl SqliteIdentityRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityRepository {
    async fn find(&self, kind: EntityKind, id: &str) -> Result<Option<Pk>> {
        let id = id.to_string();
        self.db.blocking(move |conn| query_pk(conn, kind, &id)).await
    }

    async fn insert(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.db.blocking(move |conn| insert_identity(conn, kind, &id)).await
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.db.blocking(move |conn| delete_identity(conn, kind, &id)).await
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn query_pk(conn: &SqliteConnection, kind: EntityKind, id: &str) -> StorageResult<Option<Pk>> {
    let sql = format!("SELECT pk FROM {} WHERE id = ?1", entity_table(kind));
    conn.query_opt(&sql, params![id], |row| row.get(0).map(Pk))
}

fn insert_identity(conn: &SqliteConnection, kind: EntityKind, id: &str) -> StorageResult<bool> {
    let sql = format!("INSERT INTO {} (id, created_at) VALUES (?1, ?2)", entity_table(kind));
    match conn.execute(&sql, params![id, Utc::now().timestamp()]) {
        Ok(_) => Ok(true),
        Err(err) if err.is_unique_violation() => {
            debug!(%kind, id, "identity already exists");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Remove the identity row and every series row recorded against it or
/// narrowed to it, in one transaction.
fn delete_identity(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    id: &str,
) -> StorageResult<bool> {
    let table = entity_table(kind);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let pk: Option<i64> = tx
        .query_row(&format!("SELECT pk FROM {table} WHERE id = ?1"), params![id], |row| {
            row.get(0)
        })
        .optional()?;
    let Some(pk) = pk else {
        return Ok(false);
    };

    tx.execute(&format!("DELETE FROM {table} WHERE pk = ?1"), params![pk])?;

    let mut series_tables: Vec<&str> = vec!["latest", "series_tag"];
    series_tables.extend(Resolution::ALL.into_iter().map(bucket_table));
    for family in MetricFamily::for_entity_kind(kind) {
        for series_table in &series_tables {
            tx.execute(
                &format!(
                    "DELETE FROM {series_table} WHERE entity_pk = ?1 \
                     AND type_pk IN (SELECT pk FROM metric_type WHERE family = ?2)"
                ),
                params![pk, family.as_str()],
            )?;
        }
    }
    for family in MetricFamily::scoped_by(kind) {
        for series_table in series_tables.iter().filter(|table| **table != "series_tag") {
            tx.execute(
                &format!(
                    "DELETE FROM {series_table} WHERE scope_pk = ?1 \
                     AND type_pk IN (SELECT pk FROM metric_type WHERE family = ?2)"
                ),
                params![pk, family.as_str()],
            )?;
        }
    }

    tx.commit()?;
    debug!(%kind, id, pk, "identity deleted");
    Ok(true)
}
