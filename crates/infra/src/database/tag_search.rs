//! Per-family tag search sources
//!
//! Each source answers the tag search for one metric family by joining the
//! family's entity table with the latest values of tagged series. Series
//! that never recorded a sample have no latest row and are not returned.

use std::sync::Arc;

use async_trait::async_trait;
use mtr_common::storage::{SqliteConnection, StorageResult};
use mtr_core::TagSearchSource;
use mtr_domain::{MetricFamily, Result, TaggedSeries};
use rusqlite::params;
use tracing::instrument;

use super::codec::{entity_table, time_from_millis};
use super::manager::DbManager;

pub struct SqliteTagSearchSource {
    db: Arc<DbManager>,
    family: MetricFamily,
}

impl SqliteTagSearchSource {
    pub fn new(db: Arc<DbManager>, family: MetricFamily) -> Self {
        Self { db, family }
    }

    /// One source per metric family.
    pub fn for_all_families(db: &Arc<DbManager>) -> Vec<Arc<dyn TagSearchSource>> {
        MetricFamily::ALL
            .into_iter()
            .map(|family| {
                Arc::new(Self::new(Arc::clone(db), family)) as Arc<dyn TagSearchSource>
            })
            .collect()
    }
}

#[async_trait]
impl TagSearchSource for SqliteTagSearchSource {
    fn family(&self) -> MetricFamily {
        self.family
    }

    #[instrument(skip(self), fields(family = %self.family))]
    async fn search(&self, tag: &str) -> Result<Vec<TaggedSeries>> {
        let tag = tag.to_string();
        let family = self.family;
        self.db.blocking(move |conn| query_tagged_series(conn, family, &tag)).await
    }
}

fn query_tagged_series(
    conn: &SqliteConnection,
    family: MetricFamily,
    tag: &str,
) -> StorageResult<Vec<TaggedSeries>> {
    let sql = format!(
        "SELECT e.id, mt.type_id, l.time_ms, l.value * mt.scale, mt.unit \
         FROM tag t \
         JOIN series_tag st ON st.tag_pk = t.pk \
         JOIN metric_type mt ON mt.pk = st.type_pk \
         JOIN {entities} e ON e.pk = st.entity_pk \
         JOIN latest l ON l.entity_pk = st.entity_pk AND l.type_pk = st.type_pk \
             AND l.scope_pk = 0 \
         WHERE t.name = ?1 AND mt.family = ?2 \
         ORDER BY e.id ASC, mt.type_id ASC",
        entities = entity_table(family.entity_kind())
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map(params![tag, family.as_str()], |row| {
        Ok(TaggedSeries {
            entity_id: row.get(0)?,
            type_id: row.get(1)?,
            time: time_from_millis(2, row.get(2)?)?,
            value: row.get(3)?,
            unit: row.get(4)?,
        })
    })
}
