//! Cron-driven retention sweeps.
//!
//! Wraps a [`RetentionSweeper`] in a `tokio-cron-scheduler` job. Each tick
//! sweeps every resolution as of the tick's wall-clock time, under a job
//! timeout; a failed or timed-out sweep is logged and the next tick tries
//! again.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mtr_core::RetentionSweeper;
//! use mtr_infra::scheduling::{RetentionScheduler, RetentionSchedulerConfig, SchedulerResult};
//!
//! # async fn example(sweeper: Arc<RetentionSweeper>) -> SchedulerResult<()> {
//! let mut scheduler =
//!     RetentionScheduler::with_config(RetentionSchedulerConfig::default(), sweeper).await?;
//!
//! scheduler.start().await?;
//! // ... engine runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use mtr_core::{RetentionSweeper, SweepReport};
use mtr_domain::RetentionConfig;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the retention scheduler.
#[derive(Debug, Clone)]
pub struct RetentionSchedulerConfig {
    /// Cron expression (seconds first) describing the sweep schedule.
    pub cron_expression: String,
    /// Timeout applied to a single sweep.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for RetentionSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: mtr_domain::constants::DEFAULT_RETENTION_CRON.into(),
            job_timeout: Duration::from_secs(50),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl RetentionSchedulerConfig {
    /// Scheduler settings for `retention`, default timeouts.
    pub fn from_retention(retention: &RetentionConfig) -> Self {
        Self { cron_expression: retention.cron_expression.clone(), ..Self::default() }
    }
}

/// Counters across every sweep the scheduler ran.
#[derive(Debug, Default)]
pub struct SweepStats {
    runs: AtomicU64,
    rows_deleted: AtomicU64,
    failed_resolutions: AtomicU64,
    timeouts: AtomicU64,
}

impl SweepStats {
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    pub fn rows_deleted(&self) -> u64 {
        self.rows_deleted.load(Ordering::Relaxed)
    }

    pub fn failed_resolutions(&self) -> u64 {
        self.failed_resolutions.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    fn record(&self, report: &SweepReport) {
        let deleted = u64::try_from(report.total_deleted()).unwrap_or(u64::MAX);
        let failed = u64::try_from(report.failures.len()).unwrap_or(u64::MAX);
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.rows_deleted.fetch_add(deleted, Ordering::Relaxed);
        self.failed_resolutions.fetch_add(failed, Ordering::Relaxed);
    }
}

/// Retention scheduler with explicit lifecycle management.
pub struct RetentionScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    config: RetentionSchedulerConfig,
    job_id: Uuid,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    sweeper: Arc<RetentionSweeper>,
    stats: Arc<SweepStats>,
}

impl RetentionScheduler {
    /// Create a scheduler with default timeouts.
    pub async fn new(
        cron_expression: String,
        sweeper: Arc<RetentionSweeper>,
    ) -> SchedulerResult<Self> {
        let config = RetentionSchedulerConfig { cron_expression, ..Default::default() };
        Self::with_config(config, sweeper).await
    }

    /// Create a scheduler with a custom configuration.
    ///
    /// # Errors
    /// [`SchedulerError::JobRegistrationFailed`] for an invalid cron
    /// expression.
    pub async fn with_config(
        config: RetentionSchedulerConfig,
        sweeper: Arc<RetentionSweeper>,
    ) -> SchedulerResult<Self> {
        let raw_scheduler =
            JobScheduler::new().await.map_err(|source| SchedulerError::CreationFailed { source })?;

        let mut scheduler = Self {
            scheduler: Arc::new(RwLock::new(raw_scheduler)),
            config,
            job_id: Uuid::nil(),
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            sweeper,
            stats: Arc::new(SweepStats::default()),
        };

        scheduler.job_id = scheduler.register_sweep_job().await?;
        Ok(scheduler)
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler = self.scheduler.clone();
        let start_timeout = self.config.start_timeout;
        let start_result = tokio::time::timeout(start_timeout, async move {
            let guard = scheduler.write().await;
            guard.start().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?;

        start_result.map_err(|source| SchedulerError::StartFailed { source })?;

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("Retention scheduler monitor cancelled");
        });

        self.monitor_handle = Some(handle);
        info!(cron = %self.config.cron_expression, "Retention scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let scheduler = self.scheduler.clone();
        let stop_timeout = self.config.stop_timeout;
        let stop_result = tokio::time::timeout(stop_timeout, async move {
            let mut guard = scheduler.write().await;
            guard.shutdown().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?;

        stop_result.map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!(
            runs = self.stats.runs(),
            rows_deleted = self.stats.rows_deleted(),
            "Retention scheduler stopped"
        );
        Ok(())
    }

    /// Returns true when the monitor task is active.
    pub fn is_running(&self) -> bool {
        self.monitor_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Run one sweep now, outside the schedule.
    pub async fn sweep_once(&self) -> SweepReport {
        run_sweep(&self.sweeper, &self.stats).await
    }

    pub fn stats(&self) -> &SweepStats {
        &self.stats
    }

    async fn register_sweep_job(&mut self) -> SchedulerResult<Uuid> {
        if self.job_id != Uuid::nil() {
            return Ok(self.job_id);
        }

        let sweeper = self.sweeper.clone();
        let stats = self.stats.clone();
        let job_timeout = self.config.job_timeout;

        let job_definition =
            Job::new_async(self.config.cron_expression.as_str(), move |_id, _lock| {
                let sweeper = sweeper.clone();
                let stats = stats.clone();

                Box::pin(async move {
                    let started = Instant::now();
                    match tokio::time::timeout(job_timeout, run_sweep(&sweeper, &stats)).await {
                        Ok(report) if report.is_clean() => {
                            debug!(
                                deleted = report.total_deleted(),
                                elapsed_ms = started.elapsed().as_millis(),
                                "Retention sweep finished"
                            );
                        }
                        Ok(report) => {
                            error!(
                                failures = report.failures.len(),
                                deleted = report.total_deleted(),
                                "Retention sweep incomplete"
                            );
                        }
                        Err(_) => {
                            stats.timeouts.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                timeout_secs = job_timeout.as_secs(),
                                "Retention sweep timed out"
                            );
                        }
                    }
                })
            })
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = job_definition.guid();
        let scheduler = self.scheduler.write().await;
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "Registered retention job");
        Ok(job_id)
    }
}

async fn run_sweep(sweeper: &RetentionSweeper, stats: &SweepStats) -> SweepReport {
    let report = sweeper.sweep(Utc::now()).await;
    stats.record(&report);
    report
}

impl Drop for RetentionScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("RetentionScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::DateTime;
    use mtr_core::RetentionStore;
    use mtr_domain::{MtrError, Resolution, Result};

    use super::*;

    #[derive(Default)]
    struct RecordingStore {
        cutoffs: Mutex<Vec<(Resolution, DateTime<Utc>)>>,
        fail: bool,
    }

    #[async_trait]
    impl RetentionStore for RecordingStore {
        async fn delete_before(
            &self,
            resolution: Resolution,
            cutoff: DateTime<Utc>,
        ) -> Result<usize> {
            if self.fail {
                return Err(MtrError::Database("disk I/O error".into()));
            }
            self.cutoffs.lock().unwrap().push((resolution, cutoff));
            Ok(2)
        }
    }

    fn sweeper(store: Arc<RecordingStore>) -> Arc<RetentionSweeper> {
        Arc::new(RetentionSweeper::from_config(store, &RetentionConfig::default()))
    }

    fn fast_config() -> RetentionSchedulerConfig {
        RetentionSchedulerConfig {
            cron_expression: "*/1 * * * * *".into(),
            job_timeout: Duration::from_secs(2),
            start_timeout: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(2),
            join_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lifecycle_runs_sweeps() {
        let store = Arc::new(RecordingStore::default());
        let mut scheduler = RetentionScheduler::with_config(fast_config(), sweeper(store.clone()))
            .await
            .expect("scheduler created");

        scheduler.start().await.expect("start succeeds");
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        scheduler.stop().await.expect("stop succeeds");

        assert!(scheduler.stats().runs() >= 1);
        assert!(!store.cutoffs.lock().unwrap().is_empty());
        assert!(!scheduler.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn double_start_is_rejected() {
        let store = Arc::new(RecordingStore::default());
        let mut scheduler = RetentionScheduler::with_config(fast_config(), sweeper(store))
            .await
            .expect("scheduler created");

        scheduler.start().await.expect("first start");
        let err = scheduler.start().await.expect_err("second start fails");
        assert!(matches!(err, SchedulerError::AlreadyRunning));
        scheduler.stop().await.expect("stop succeeds");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_without_start_is_rejected() {
        let store = Arc::new(RecordingStore::default());
        let mut scheduler = RetentionScheduler::with_config(fast_config(), sweeper(store))
            .await
            .expect("scheduler created");

        assert!(matches!(scheduler.stop().await, Err(SchedulerError::NotRunning)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_cron_is_a_registration_failure() {
        let store = Arc::new(RecordingStore::default());
        let config =
            RetentionSchedulerConfig { cron_expression: "not a cron".into(), ..fast_config() };

        let result = RetentionScheduler::with_config(config, sweeper(store)).await;
        assert!(matches!(result, Err(SchedulerError::JobRegistrationFailed { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sweep_once_records_stats() {
        let store = Arc::new(RecordingStore::default());
        let scheduler = RetentionScheduler::with_config(fast_config(), sweeper(store.clone()))
            .await
            .expect("scheduler created");

        let report = scheduler.sweep_once().await;

        assert!(report.is_clean());
        assert_eq!(report.total_deleted(), 2 * Resolution::ALL.len());
        assert_eq!(scheduler.stats().runs(), 1);
        assert_eq!(scheduler.stats().rows_deleted(), 8);

        let cutoffs = store.cutoffs.lock().unwrap();
        let (resolution, cutoff) = cutoffs[0];
        assert_eq!(resolution, Resolution::Minute);
        assert!(cutoff < Utc::now() - chrono::Duration::minutes(1439));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_sweeps_are_counted_per_resolution() {
        let store = Arc::new(RecordingStore { fail: true, ..Default::default() });
        let scheduler = RetentionScheduler::with_config(fast_config(), sweeper(store))
            .await
            .expect("scheduler created");

        let report = scheduler.sweep_once().await;

        assert!(!report.is_clean());
        assert_eq!(scheduler.stats().failed_resolutions(), 4);
        assert_eq!(scheduler.stats().rows_deleted(), 0);
    }
}
