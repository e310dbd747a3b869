//! Shared harness for infra integration tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use mtr_core::{
    AggregationService, IdentityCache, IngestService, MetricTypeRegistry, RetentionSweeper,
    SeriesService, TagSearchService, TagService,
};
use mtr_domain::{EntityKind, RetentionConfig, SampleRequest, WriteStrategy};
use mtr_infra::database::{
    DbManager, SqliteBucketRepository, SqliteIdentityRepository, SqliteLatestRepository,
    SqliteMetricTypeRepository, SqliteSeriesReader, SqliteTagRepository, SqliteTagSearchSource,
};
use tempfile::TempDir;

/// Start of an hour, used as the time origin of every test.
pub fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 13, 0, 0).single().expect("valid timestamp")
}

/// RFC 3339 time `secs` after [`origin`].
pub fn at(secs: i64) -> String {
    (origin() + chrono::Duration::seconds(secs)).to_rfc3339()
}

pub fn gauge(
    kind: EntityKind,
    id: &str,
    type_id: &str,
    time: String,
    value: f64,
) -> SampleRequest {
    SampleRequest {
        entity_kind: Some(kind),
        entity_id: id.into(),
        type_id: type_id.into(),
        time,
        value: Some(value.to_string()),
        ..SampleRequest::default()
    }
}

pub fn counter(id: &str, type_id: &str, time: String, count: i64) -> SampleRequest {
    SampleRequest {
        entity_kind: Some(EntityKind::Application),
        entity_id: id.into(),
        type_id: type_id.into(),
        time,
        count: Some(count.to_string()),
        ..SampleRequest::default()
    }
}

pub fn timer(id: &str, type_id: &str, time: String, total: f64, count: i64) -> SampleRequest {
    SampleRequest {
        total: Some(total.to_string()),
        ..counter(id, type_id, time, count)
    }
}

/// The full engine wired over a temporary SQLite database.
pub struct TestEngine {
    pub manager: Arc<DbManager>,
    pub buckets: Arc<SqliteBucketRepository>,
    pub identities: Arc<IdentityCache>,
    pub ingest: Arc<IngestService>,
    pub series: Arc<SeriesService>,
    pub tags: TagService,
    pub search: TagSearchService,
    pub sweeper: RetentionSweeper,
    _temp_dir: TempDir,
}

impl TestEngine {
    pub fn new(strategy: WriteStrategy) -> Self {
        Self::with_retention(strategy, &RetentionConfig::default())
    }

    pub fn with_retention(strategy: WriteStrategy, retention: &RetentionConfig) -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let manager = Arc::new(
            DbManager::new(temp_dir.path().join("engine.db"), 8, Duration::from_secs(10))
                .expect("db manager should be created"),
        );
        manager.run_migrations().expect("schema migrations should apply");

        let buckets =
            Arc::new(SqliteBucketRepository::with_strategy(Arc::clone(&manager), strategy));
        let identities = Arc::new(IdentityCache::new(Arc::new(SqliteIdentityRepository::new(
            Arc::clone(&manager),
        ))));
        let registry = Arc::new(MetricTypeRegistry::new(Arc::new(
            SqliteMetricTypeRepository::new(Arc::clone(&manager)),
        )));
        let aggregation = Arc::new(AggregationService::new(
            buckets.clone(),
            Arc::new(SqliteLatestRepository::new(Arc::clone(&manager))),
            Duration::from_secs(60),
        ));
        let ingest = Arc::new(IngestService::new(
            Arc::clone(&identities),
            Arc::clone(&registry),
            aggregation,
        ));
        let series = Arc::new(SeriesService::new(
            Arc::clone(&identities),
            Arc::clone(&registry),
            Arc::new(SqliteSeriesReader::new(Arc::clone(&manager))),
        ));
        let tags = TagService::new(
            Arc::clone(&series),
            Arc::new(SqliteTagRepository::new(Arc::clone(&manager))),
        );
        let search = TagSearchService::new(SqliteTagSearchSource::for_all_families(&manager));
        let sweeper = RetentionSweeper::from_config(buckets.clone(), retention);

        Self {
            manager,
            buckets,
            identities,
            ingest,
            series,
            tags,
            search,
            sweeper,
            _temp_dir: temp_dir,
        }
    }

    /// Number of rows in `table`.
    pub fn count(&self, table: &str) -> i64 {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), &[], |row| row.get(0))
            .expect("count query should succeed")
    }

    pub fn execute_batch(&self, sql: &str) {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }
}
