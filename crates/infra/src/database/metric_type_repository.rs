//! Metric type taxonomy repository

use std::sync::Arc;

use async_trait::async_trait;
use mtr_common::storage::{SqliteConnection, StorageResult};
use mtr_core::MetricTypeStore;
use mtr_domain::{MetricFamily, MetricType, Pk, Result};
use rusqlite::types::Type;
use rusqlite::Row;

use super::manager::DbManager;

pub struct SqliteMetricTypeRepository {
    db: Arc<DbManager>,
}

impl SqliteMetricTypeRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MetricTypeStore for SqliteMetricTypeRepository {
    async fn load_all(&self) -> Result<Vec<MetricType>> {
        self.db.blocking(|conn| query_metric_types(conn)).await
    }
}

fn query_metric_types(conn: &SqliteConnection) -> StorageResult<Vec<MetricType>> {
    let mut stmt = conn.prepare(
        "SELECT pk, type_id, family, scale, unit, display FROM metric_type ORDER BY pk ASC",
    )?;
    stmt.query_map(&[], map_metric_type_row)
}

fn map_metric_type_row(row: &Row<'_>) -> rusqlite::Result<MetricType> {
    let family: String = row.get(2)?;
    let family = family
        .parse::<MetricFamily>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(MetricType {
        pk: Pk(row.get(0)?),
        type_id: row.get(1)?,
        family,
        scale: row.get(3)?,
        unit: row.get(4)?,
        display: row.get(5)?,
    })
}
