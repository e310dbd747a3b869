//! Shared test helpers for `mtr-core` integration tests.
//!
//! In-memory implementations of every storage port. Each store keeps its
//! rows behind a `parking_lot::Mutex` and honours the same uniqueness and
//! conditional-update rules as the SQLite adapters, so the services can be
//! exercised without a database.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mtr_core::{
    AggregationService, BucketStore, IdentityCache, IdentityStore, IngestService, InsertOutcome,
    LatestStore, MetricTypeRegistry, MetricTypeStore, RetentionStore, SeriesReader,
    SeriesService, TagRepository,
};
use mtr_domain::{
    Bucket, BucketAggregate, BucketKey, EntityKind, LatestValue, MetricFamily, MetricType,
    MtrError, Pk, Resolution, Result, SampleValue, SeriesKey,
};
use parking_lot::Mutex;

/// Identity rows with never-reused keys and an insert counter.
#[derive(Default)]
pub struct MemoryIdentities {
    rows: Mutex<HashMap<(EntityKind, String), Pk>>,
    next_pk: AtomicI64,
    pub inserts: AtomicUsize,
    pub rows_created: AtomicUsize,
}

impl MemoryIdentities {
    pub fn count(&self, kind: EntityKind) -> usize {
        self.rows.lock().keys().filter(|(k, _)| *k == kind).count()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentities {
    async fn find(&self, kind: EntityKind, id: &str) -> Result<Option<Pk>> {
        tokio::task::yield_now().await;
        Ok(self.rows.lock().get(&(kind, id.to_owned())).copied())
    }

    async fn insert(&self, kind: EntityKind, id: &str) -> Result<bool> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let mut rows = self.rows.lock();
        if rows.contains_key(&(kind, id.to_owned())) {
            return Ok(false);
        }
        let pk = Pk(self.next_pk.fetch_add(1, Ordering::SeqCst) + 1);
        rows.insert((kind, id.to_owned()), pk);
        self.rows_created.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        Ok(self.rows.lock().remove(&(kind, id.to_owned())).is_some())
    }
}

/// Fixed metric taxonomy.
pub struct MemoryTypes(pub Vec<MetricType>);

impl MemoryTypes {
    pub fn standard() -> Self {
        let t = |pk, type_id: &str, family, scale, unit: &str| MetricType {
            pk: Pk(pk),
            type_id: type_id.into(),
            family,
            scale,
            unit: unit.into(),
            display: type_id.into(),
        };
        Self(vec![
            t(1, "voltage", MetricFamily::Field, 1.0, "V"),
            t(2, "latency.strong", MetricFamily::Latency, 1.0, "ms"),
            t(3, "http.requests", MetricFamily::Counter, 1.0, "count"),
            t(4, "db.query", MetricFamily::Timer, 1.0, "ms"),
        ])
    }
}

#[async_trait]
impl MetricTypeStore for MemoryTypes {
    async fn load_all(&self) -> Result<Vec<MetricType>> {
        Ok(self.0.clone())
    }
}

/// Buckets, latest values and tags in one place, like the SQLite database.
#[derive(Default)]
pub struct MemorySeries {
    buckets: Mutex<HashMap<BucketKey, BucketAggregate>>,
    latest: Mutex<HashMap<SeriesKey, (DateTime<Utc>, f64)>>,
    tags: Mutex<BTreeMap<SeriesKey, BTreeSet<String>>>,
    pub fail_deletes: AtomicBool,
}

impl MemorySeries {
    pub fn bucket(&self, key: &BucketKey) -> Option<BucketAggregate> {
        self.buckets.lock().get(key).copied()
    }

    pub fn bucket_count(&self, resolution: Resolution) -> usize {
        self.buckets.lock().keys().filter(|k| k.resolution == resolution).count()
    }

    pub fn seed_bucket(&self, key: BucketKey, aggregate: BucketAggregate) {
        self.buckets.lock().insert(key, aggregate);
    }
}

#[async_trait]
impl BucketStore for MemorySeries {
    async fn try_insert(&self, key: &BucketKey, value: SampleValue) -> Result<InsertOutcome> {
        tokio::task::yield_now().await;
        let mut buckets = self.buckets.lock();
        if buckets.contains_key(key) {
            return Ok(InsertOutcome::Conflict);
        }
        buckets.insert(*key, BucketAggregate::first(value));
        Ok(InsertOutcome::Inserted)
    }

    async fn merge_update(&self, key: &BucketKey, value: SampleValue) -> Result<bool> {
        tokio::task::yield_now().await;
        let mut buckets = self.buckets.lock();
        match buckets.get_mut(key) {
            Some(aggregate) => {
                *aggregate = aggregate.merge(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl LatestStore for MemorySeries {
    async fn upsert_latest(
        &self,
        series: SeriesKey,
        time: DateTime<Utc>,
        value: f64,
    ) -> Result<bool> {
        let mut latest = self.latest.lock();
        match latest.get(&series) {
            Some((stored, _)) if *stored >= time => Ok(false),
            _ => {
                latest.insert(series, (time, value));
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl SeriesReader for MemorySeries {
    async fn latest(&self, series: SeriesKey) -> Result<Option<LatestValue>> {
        Ok(self
            .latest
            .lock()
            .get(&series)
            .map(|(time, value)| LatestValue { series, time: *time, value: *value }))
    }

    async fn buckets(
        &self,
        series: SeriesKey,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bucket>> {
        let mut rows: Vec<Bucket> = self
            .buckets
            .lock()
            .iter()
            .filter(|(k, _)| {
                k.series == series && k.resolution == resolution && k.start >= from && k.start <= to
            })
            .map(|(key, aggregate)| Bucket { key: *key, aggregate: *aggregate })
            .collect();
        rows.sort_by_key(|b| b.key.start);
        Ok(rows)
    }
}

#[async_trait]
impl RetentionStore for MemorySeries {
    async fn delete_before(&self, resolution: Resolution, cutoff: DateTime<Utc>) -> Result<usize> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(MtrError::Database("database is locked".into()));
        }
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|k, _| k.resolution != resolution || k.start >= cutoff);
        Ok(before - buckets.len())
    }
}

#[async_trait]
impl TagRepository for MemorySeries {
    async fn add_tag(&self, series: SeriesKey, tag: &str) -> Result<bool> {
        Ok(self.tags.lock().entry(series).or_default().insert(tag.to_owned()))
    }

    async fn remove_tag(&self, series: SeriesKey, tag: &str) -> Result<bool> {
        Ok(self.tags.lock().get_mut(&series).is_some_and(|tags| tags.remove(tag)))
    }

    async fn tags_for(&self, series: SeriesKey) -> Result<Vec<String>> {
        Ok(self.tags.lock().get(&series).map(|t| t.iter().cloned().collect()).unwrap_or_default())
    }
}

/// Fully wired engine over in-memory stores.
pub struct Engine {
    pub identities_store: Arc<MemoryIdentities>,
    pub series_store: Arc<MemorySeries>,
    pub identities: Arc<IdentityCache>,
    pub registry: Arc<MetricTypeRegistry>,
    pub aggregation: Arc<AggregationService>,
    pub ingest: IngestService,
    pub series: Arc<SeriesService>,
}

impl Engine {
    pub fn new() -> Self {
        let identities_store = Arc::new(MemoryIdentities::default());
        let series_store = Arc::new(MemorySeries::default());
        let identities = Arc::new(IdentityCache::new(identities_store.clone()));
        let registry = Arc::new(MetricTypeRegistry::new(Arc::new(MemoryTypes::standard())));
        let aggregation = Arc::new(AggregationService::new(
            series_store.clone(),
            series_store.clone(),
            Duration::from_secs(60),
        ));
        let ingest =
            IngestService::new(identities.clone(), registry.clone(), aggregation.clone());
        let series = Arc::new(SeriesService::new(
            identities.clone(),
            registry.clone(),
            series_store.clone(),
        ));
        Self { identities_store, series_store, identities, registry, aggregation, ingest, series }
    }
}
