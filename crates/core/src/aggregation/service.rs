//! Aggregation service - multi-resolution bucket writes

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mtr_domain::{
    truncate_to, BucketKey, BucketWrite, MetricFamily, MtrError, RecordOutcome, ResolutionPolicy,
    Result, SampleValue, SeriesKey, WriteMode,
};
use tracing::{debug, instrument};

use super::ports::{BucketStore, InsertOutcome, LatestStore};

/// Records samples into buckets.
///
/// For each family the plan lists resolutions finest first. A rate-limited
/// resolution only ever inserts: the first sample of a rate-limit window
/// creates the bucket and later ones are turned away, which also skips the
/// coarser resolutions. Merging resolutions fold every sample in. The
/// latest-value row is upserted before any bucket and is never rate
/// limited.
pub struct AggregationService {
    buckets: Arc<dyn BucketStore>,
    latest: Arc<dyn LatestStore>,
    plans: HashMap<MetricFamily, Vec<ResolutionPolicy>>,
    rate_limit_window_secs: i64,
}

impl AggregationService {
    /// Create a service using each family's default plan.
    pub fn new(
        buckets: Arc<dyn BucketStore>,
        latest: Arc<dyn LatestStore>,
        rate_limit_window: Duration,
    ) -> Self {
        let plans = MetricFamily::ALL.iter().map(|f| (*f, f.default_plan())).collect();
        let rate_limit_window_secs =
            i64::try_from(rate_limit_window.as_secs()).unwrap_or(i64::MAX).max(1);
        Self { buckets, latest, plans, rate_limit_window_secs }
    }

    /// Replace the resolution plan of `family`.
    pub fn with_plan(mut self, family: MetricFamily, plan: Vec<ResolutionPolicy>) -> Self {
        self.plans.insert(family, plan);
        self
    }

    pub fn plan(&self, family: MetricFamily) -> &[ResolutionPolicy] {
        self.plans.get(&family).map_or(&[], Vec::as_slice)
    }

    pub const fn rate_limit_window_secs(&self) -> i64 {
        self.rate_limit_window_secs
    }

    /// Record one sample for `series`.
    ///
    /// # Errors
    /// `Validation` when the value does not match the family; storage errors
    /// propagate with the failing bucket in their context. Writes made
    /// before the failure stay in place.
    #[instrument(
        skip(self, series, value),
        fields(
            entity_pk = %series.entity_pk,
            type_pk = %series.type_pk,
            scope = ?series.scope
        )
    )]
    pub async fn record(
        &self,
        series: SeriesKey,
        family: MetricFamily,
        time: DateTime<Utc>,
        value: SampleValue,
    ) -> Result<RecordOutcome> {
        if value.kind() != family.value_kind() {
            return Err(MtrError::Validation(format!(
                "{family} samples carry {} values, got {}",
                family.value_kind(),
                value.kind()
            )));
        }
        value.validate()?;

        let latest_updated = self
            .latest
            .upsert_latest(series, time, value.latest_value())
            .await
            .map_err(|e| e.context(format!("latest {series}")))?;

        let plan = self.plan(family);
        let mut writes = Vec::with_capacity(plan.len());

        for policy in plan {
            match policy.mode {
                WriteMode::RateLimited => {
                    let key = BucketKey {
                        series,
                        resolution: policy.resolution,
                        start: truncate_to(time, self.rate_limit_window_secs),
                    };
                    let outcome = self
                        .buckets
                        .try_insert(&key, value)
                        .await
                        .map_err(|e| e.context(format!("insert {key}")))?;
                    if outcome == InsertOutcome::Conflict {
                        debug!(%key, "sample rate limited");
                        return Ok(RecordOutcome::RateLimited {
                            resolution: policy.resolution,
                            bucket_start: key.start,
                            latest_updated,
                        });
                    }
                    writes.push((policy.resolution, BucketWrite::Created));
                }
                WriteMode::Merge => {
                    let key = BucketKey::containing(series, policy.resolution, time);
                    let write = self
                        .buckets
                        .upsert(&key, value)
                        .await
                        .map_err(|e| e.context(format!("upsert {key}")))?;
                    writes.push((policy.resolution, write));
                }
            }
        }

        Ok(RecordOutcome::Recorded { writes, latest_updated })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::TimeZone;
    use mtr_domain::{BucketAggregate, Pk, Resolution};
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct MemoryBuckets {
        rows: Mutex<HashMap<BucketKey, BucketAggregate>>,
        fail_on: Mutex<Option<Resolution>>,
    }

    impl MemoryBuckets {
        fn get(&self, key: &BucketKey) -> Option<BucketAggregate> {
            self.rows.lock().get(key).copied()
        }

        fn check(&self, key: &BucketKey) -> Result<()> {
            if *self.fail_on.lock() == Some(key.resolution) {
                return Err(MtrError::Database("database is locked".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BucketStore for MemoryBuckets {
        async fn try_insert(&self, key: &BucketKey, value: SampleValue) -> Result<InsertOutcome> {
            self.check(key)?;
            let mut rows = self.rows.lock();
            if rows.contains_key(key) {
                return Ok(InsertOutcome::Conflict);
            }
            rows.insert(*key, BucketAggregate::first(value));
            Ok(InsertOutcome::Inserted)
        }

        async fn merge_update(&self, key: &BucketKey, value: SampleValue) -> Result<bool> {
            self.check(key)?;
            let mut rows = self.rows.lock();
            match rows.get_mut(key) {
                Some(aggregate) => {
                    *aggregate = aggregate.merge(value);
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    #[derive(Default)]
    struct MemoryLatest {
        rows: Mutex<HashMap<SeriesKey, (DateTime<Utc>, f64)>>,
    }

    #[async_trait]
    impl LatestStore for MemoryLatest {
        async fn upsert_latest(
            &self,
            series: SeriesKey,
            time: DateTime<Utc>,
            value: f64,
        ) -> Result<bool> {
            let mut rows = self.rows.lock();
            match rows.get(&series) {
                Some((stored, _)) if *stored >= time => Ok(false),
                _ => {
                    rows.insert(series, (time, value));
                    Ok(true)
                }
            }
        }
    }

    const SERIES: SeriesKey = SeriesKey::new(Pk(1), Pk(2));

    fn at(minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 13, minute, second).single().unwrap()
    }

    fn service() -> (Arc<MemoryBuckets>, Arc<MemoryLatest>, AggregationService) {
        let buckets = Arc::new(MemoryBuckets::default());
        let latest = Arc::new(MemoryLatest::default());
        let service =
            AggregationService::new(buckets.clone(), latest.clone(), Duration::from_secs(60));
        (buckets, latest, service)
    }

    #[tokio::test]
    async fn first_sample_creates_every_resolution() {
        let (_buckets, _latest, service) = service();

        let outcome =
            service.record(SERIES, MetricFamily::Field, at(47, 5), SampleValue::gauge(3.0)).await;

        assert_eq!(
            outcome.unwrap(),
            RecordOutcome::Recorded {
                writes: vec![
                    (Resolution::Minute, BucketWrite::Created),
                    (Resolution::Hour, BucketWrite::Created),
                    (Resolution::Day, BucketWrite::Created),
                ],
                latest_updated: true,
            }
        );
    }

    #[tokio::test]
    async fn same_minute_is_rate_limited_and_skips_coarser_buckets() {
        let (buckets, latest, service) = service();
        service
            .record(SERIES, MetricFamily::Field, at(47, 5), SampleValue::gauge(3.0))
            .await
            .unwrap();

        let outcome = service
            .record(SERIES, MetricFamily::Field, at(47, 35), SampleValue::gauge(9.0))
            .await
            .unwrap();

        assert!(outcome.is_rate_limited());
        let hour = BucketKey::containing(SERIES, Resolution::Hour, at(0, 0));
        assert_eq!(buckets.get(&hour), Some(BucketAggregate::Gauge { average: 3.0, count: 1 }));
        // Latest still moves forward.
        assert_eq!(latest.rows.lock().get(&SERIES).map(|(_, v)| *v), Some(9.0));
    }

    #[tokio::test]
    async fn next_minute_merges_into_coarser_buckets() {
        let (buckets, _latest, service) = service();
        service
            .record(SERIES, MetricFamily::Field, at(47, 5), SampleValue::gauge(3.0))
            .await
            .unwrap();

        let outcome = service
            .record(SERIES, MetricFamily::Field, at(48, 6), SampleValue::gauge(9.0))
            .await
            .unwrap();

        assert!(!outcome.is_rate_limited());
        let hour = BucketKey::containing(SERIES, Resolution::Hour, at(0, 0));
        assert_eq!(buckets.get(&hour), Some(BucketAggregate::Gauge { average: 6.0, count: 2 }));
    }

    #[tokio::test]
    async fn counters_sum_in_every_bucket() {
        let (buckets, _latest, service) = service();
        for count in [4, 6, 10] {
            service
                .record(SERIES, MetricFamily::Counter, at(47, 5), SampleValue::counter(count))
                .await
                .unwrap();
        }

        let five = BucketKey::containing(SERIES, Resolution::FiveMinute, at(47, 5));
        assert_eq!(buckets.get(&five), Some(BucketAggregate::Counter { count: 20 }));
    }

    #[tokio::test]
    async fn value_kind_must_match_family() {
        let (_buckets, _latest, service) = service();
        let err = service
            .record(SERIES, MetricFamily::Timer, at(47, 5), SampleValue::gauge(1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, MtrError::Validation(_)));
    }

    #[tokio::test]
    async fn storage_failure_carries_bucket_context() {
        let (buckets, _latest, service) = service();
        *buckets.fail_on.lock() = Some(Resolution::Day);

        let err = service
            .record(SERIES, MetricFamily::Field, at(47, 5), SampleValue::gauge(1.0))
            .await
            .unwrap_err();

        assert!(matches!(err, MtrError::Database(ref msg) if msg.starts_with("upsert day")));
        // Earlier resolutions keep their writes.
        let hour = BucketKey::containing(SERIES, Resolution::Hour, at(0, 0));
        assert!(buckets.get(&hour).is_some());
    }

    #[tokio::test]
    async fn custom_rate_limit_window_widens_raw_buckets() {
        let buckets = Arc::new(MemoryBuckets::default());
        let service = AggregationService::new(
            buckets.clone(),
            Arc::new(MemoryLatest::default()),
            Duration::from_secs(300),
        );

        service
            .record(SERIES, MetricFamily::Latency, at(46, 0), SampleValue::gauge(1.0))
            .await
            .unwrap();
        let second = service
            .record(SERIES, MetricFamily::Latency, at(48, 30), SampleValue::gauge(2.0))
            .await
            .unwrap();

        assert_eq!(
            second,
            RecordOutcome::RateLimited {
                resolution: Resolution::Minute,
                bucket_start: at(45, 0),
                latest_updated: true,
            }
        );
    }

    #[tokio::test]
    async fn default_upsert_recreates_swept_bucket() {
        struct VanishingOnce {
            inner: MemoryBuckets,
            vanished: Mutex<bool>,
        }

        #[async_trait]
        impl BucketStore for VanishingOnce {
            async fn try_insert(
                &self,
                key: &BucketKey,
                value: SampleValue,
            ) -> Result<InsertOutcome> {
                self.inner.try_insert(key, value).await
            }

            async fn merge_update(&self, key: &BucketKey, value: SampleValue) -> Result<bool> {
                let first_call = !std::mem::replace(&mut *self.vanished.lock(), true);
                if first_call {
                    self.inner.rows.lock().remove(key);
                    return Ok(false);
                }
                self.inner.merge_update(key, value).await
            }
        }

        let store = VanishingOnce { inner: MemoryBuckets::default(), vanished: Mutex::new(false) };
        let key = BucketKey::containing(SERIES, Resolution::Hour, at(0, 0));
        store.inner.try_insert(&key, SampleValue::gauge(1.0)).await.unwrap();

        let write = store.upsert(&key, SampleValue::gauge(5.0)).await.unwrap();

        assert_eq!(write, BucketWrite::Created);
        assert_eq!(
            store.inner.get(&key),
            Some(BucketAggregate::Gauge { average: 5.0, count: 1 })
        );
    }
}
