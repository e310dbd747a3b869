//! Engine context - dependency injection container

use std::sync::Arc;

use mtr_core::{
    AggregationService, IdentityCache, IngestService, MetricTypeRegistry, RetentionSweeper,
    SeriesService, TagSearchService, TagService,
};
use mtr_domain::{Config, MtrError, Result};
use mtr_infra::scheduling::{RetentionScheduler, RetentionSchedulerConfig};
use mtr_infra::{
    DbManager, SqliteBucketRepository, SqliteIdentityRepository, SqliteLatestRepository,
    SqliteMetricTypeRepository, SqliteSeriesReader, SqliteTagRepository, SqliteTagSearchSource,
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::utils::health::{ComponentHealth, EngineHealth};

/// Engine context - holds all services and dependencies
pub struct EngineContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub identities: Arc<IdentityCache>,
    pub registry: Arc<MetricTypeRegistry>,
    pub ingest: Arc<IngestService>,
    pub series: Arc<SeriesService>,
    pub tags: Arc<TagService>,
    pub search: Arc<TagSearchService>,
    pub sweeper: Arc<RetentionSweeper>,

    /// Present when retention is enabled; started by [`Self::new`].
    retention_scheduler: Option<Mutex<RetentionScheduler>>,
}

impl EngineContext {
    /// Wire the engine described by `config` and start its retention
    /// scheduler.
    ///
    /// # Errors
    /// `Config` for an invalid configuration or cron expression,
    /// `Database` if the store cannot be opened or migrated.
    pub async fn new(config: Config) -> Result<Self> {
        let mut ctx = Self::build(config)?;

        if ctx.config.retention.enabled {
            let scheduler_config = RetentionSchedulerConfig::from_retention(&ctx.config.retention);
            let mut scheduler =
                RetentionScheduler::with_config(scheduler_config, Arc::clone(&ctx.sweeper))
                    .await
                    .map_err(|err| {
                        error!(error = %err, "failed to construct RetentionScheduler");
                        MtrError::from(err)
                    })?;

            // Bounded by the scheduler's own start timeout.
            scheduler.start().await.map_err(|err| {
                error!(error = %err, "failed to start RetentionScheduler");
                MtrError::from(err)
            })?;

            ctx.retention_scheduler = Some(Mutex::new(scheduler));
        } else {
            info!("retention disabled; buckets are kept indefinitely");
        }

        Ok(ctx)
    }

    /// Wire every service without starting background work.
    ///
    /// # Errors
    /// See [`Self::new`].
    pub fn build(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(DbManager::open(&config.database)?);
        info!(
            db_path = %db.path().display(),
            schema_version = db.schema_version()?,
            "database ready"
        );

        let buckets = Arc::new(SqliteBucketRepository::with_strategy(
            Arc::clone(&db),
            config.aggregation.write_strategy,
        ));
        let identities =
            Arc::new(IdentityCache::new(Arc::new(SqliteIdentityRepository::new(Arc::clone(&db)))));
        let registry = Arc::new(MetricTypeRegistry::new(Arc::new(
            SqliteMetricTypeRepository::new(Arc::clone(&db)),
        )));
        let aggregation = Arc::new(AggregationService::new(
            buckets.clone(),
            Arc::new(SqliteLatestRepository::new(Arc::clone(&db))),
            config.aggregation.rate_limit_window(),
        ));
        let ingest = Arc::new(IngestService::new(
            Arc::clone(&identities),
            Arc::clone(&registry),
            aggregation,
        ));
        let series = Arc::new(SeriesService::new(
            Arc::clone(&identities),
            Arc::clone(&registry),
            Arc::new(SqliteSeriesReader::new(Arc::clone(&db))),
        ));
        let tags = Arc::new(TagService::new(
            Arc::clone(&series),
            Arc::new(SqliteTagRepository::new(Arc::clone(&db))),
        ));
        let search = Arc::new(TagSearchService::new(SqliteTagSearchSource::for_all_families(&db)));
        let sweeper = Arc::new(RetentionSweeper::from_config(buckets, &config.retention));

        info!(
            write_strategy = %config.aggregation.write_strategy,
            rate_limit_window_secs = config.aggregation.rate_limit_window_secs,
            "engine wired"
        );

        Ok(Self {
            config,
            db,
            identities,
            registry,
            ingest,
            series,
            tags,
            search,
            sweeper,
            retention_scheduler: None,
        })
    }

    /// Whether the retention scheduler is currently running.
    pub async fn retention_running(&self) -> bool {
        match &self.retention_scheduler {
            Some(scheduler) => scheduler.lock().await.is_running(),
            None => false,
        }
    }

    /// Health of the store and the background scheduler.
    pub async fn health(&self) -> EngineHealth {
        let database = match self.db.health_check() {
            Ok(()) => ComponentHealth::healthy("database"),
            Err(err) => ComponentHealth::unhealthy("database", err.to_string()),
        };
        let pool = self.db.pool_health();
        let pool = if pool.healthy {
            ComponentHealth::healthy("pool")
        } else {
            ComponentHealth::unhealthy("pool", pool.message.unwrap_or_default())
        };

        let mut health = EngineHealth::new().add_component(database).add_component(pool);
        if self.config.retention.enabled {
            let retention = if self.retention_running().await {
                ComponentHealth::healthy("retention")
            } else {
                ComponentHealth::unhealthy("retention", "scheduler not running")
            };
            health = health.add_component(retention);
        }
        health.calculate_score();
        health
    }

    /// Stop background work. Safe to call more than once.
    ///
    /// # Errors
    /// `Internal` if the scheduler fails to stop.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutdown called on EngineContext");

        let Some(scheduler) = &self.retention_scheduler else {
            return Ok(());
        };
        let mut scheduler = scheduler.lock().await;
        if !scheduler.is_running() {
            return Ok(());
        }

        let stats = scheduler.stats();
        info!(
            runs = stats.runs(),
            rows_deleted = stats.rows_deleted(),
            failed_resolutions = stats.failed_resolutions(),
            timeouts = stats.timeouts(),
            "stopping retention scheduler"
        );
        scheduler.stop().await.map_err(|err| {
            warn!(error = %err, "failed to stop RetentionScheduler");
            MtrError::from(err)
        })
    }
}
