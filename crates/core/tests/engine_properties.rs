//! Behavioural tests of the engine services over in-memory stores.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use mtr_core::{RetentionSweeper, TagService};
use mtr_domain::{
    BucketAggregate, BucketKey, EntityKind, MtrError, Pk, RecordOutcome, Resolution,
    RetentionConfig, SampleRequest, SeriesKey,
};
use support::Engine;

fn at(minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 13, minute, second).single().unwrap()
}

fn gauge(entity_id: &str, type_id: &str, time: DateTime<Utc>, value: f64) -> SampleRequest {
    SampleRequest {
        entity_kind: None,
        entity_id: entity_id.into(),
        type_id: type_id.into(),
        time: time.to_rfc3339(),
        value: Some(value.to_string()),
        ..SampleRequest::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_resolves_create_one_identity() {
    let engine = Arc::new(Engine::new());

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(
                async move { engine.identities.resolve(EntityKind::Device, "TAUP").await },
            )
        })
        .collect();

    let mut pks = Vec::new();
    let mut created = 0;
    for handle in handles {
        let resolved = handle.await.unwrap().unwrap();
        created += usize::from(resolved.was_created());
        pks.push(resolved.pk());
    }

    assert!(pks.iter().all(|pk| *pk == pks[0]));
    assert_eq!(created, 1);
    assert_eq!(engine.identities_store.rows_created.load(Ordering::SeqCst), 1);
    assert_eq!(engine.identities_store.inserts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn hour_bucket_holds_arithmetic_mean_of_samples() {
    let engine = Engine::new();
    let values = [3.0, 9.0, 4.5, -1.5, 10.0];

    // One sample per minute, arriving newest first.
    for (minute, value) in (10..15).rev().zip(values) {
        engine.ingest.ingest(gauge("TAUP", "voltage", at(minute, 0), value)).await.unwrap();
    }

    let series = engine.series.series(EntityKind::Device, "TAUP", "voltage").await.unwrap();
    let hour = BucketKey::containing(series, Resolution::Hour, at(0, 0));
    let Some(BucketAggregate::Gauge { average, count }) = engine.series_store.bucket(&hour) else {
        panic!("hour bucket missing");
    };
    let expected = values.iter().sum::<f64>() / values.len() as f64;
    assert!((average - expected).abs() < 1e-9);
    assert_eq!(count, 5);
}

#[tokio::test]
async fn rate_limit_boundary() {
    let engine = Engine::new();
    let t0 = at(20, 0);

    let first = engine.ingest.ingest(gauge("TAUP", "voltage", t0, 1.0)).await.unwrap();
    let second = engine
        .ingest
        .ingest(gauge("TAUP", "voltage", t0 + Duration::seconds(30), 2.0))
        .await
        .unwrap();
    let third = engine
        .ingest
        .ingest(gauge("TAUP", "voltage", t0 + Duration::seconds(61), 3.0))
        .await
        .unwrap();

    assert!(!first.is_rate_limited());
    assert!(matches!(
        second,
        RecordOutcome::RateLimited { bucket_start, .. } if bucket_start == t0
    ));
    assert!(!third.is_rate_limited());

    let series = engine.series.series(EntityKind::Device, "TAUP", "voltage").await.unwrap();
    let raw = BucketKey::containing(series, Resolution::Minute, t0);
    assert_eq!(
        engine.series_store.bucket(&raw),
        Some(BucketAggregate::Gauge { average: 1.0, count: 1 })
    );
    assert_eq!(engine.series_store.bucket_count(Resolution::Minute), 2);
}

#[tokio::test]
async fn latest_reflects_newest_timestamp_in_either_order() {
    for newest_first in [false, true] {
        let engine = Engine::new();
        let mut samples = vec![(at(1, 0), 1.0), (at(5, 0), 5.0)];
        if newest_first {
            samples.reverse();
        }
        for (time, value) in samples {
            engine.ingest.ingest(gauge("WEL", "latency.strong", time, value)).await.unwrap();
        }

        let latest =
            engine.series.latest(EntityKind::Site, "WEL", "latency.strong").await.unwrap();
        assert_eq!(latest.time, at(5, 0));
        assert!((latest.value - 5.0).abs() < f64::EPSILON);
    }
}

#[tokio::test]
async fn deleted_identity_is_recreated_with_fresh_key() {
    let engine = Engine::new();
    engine.ingest.ingest(gauge("TAUP", "voltage", at(0, 0), 1.0)).await.unwrap();
    let old = engine.identities.lookup(EntityKind::Device, "TAUP").await.unwrap();

    engine.identities.delete(EntityKind::Device, "TAUP").await.unwrap();
    assert!(matches!(
        engine.identities.lookup(EntityKind::Device, "TAUP").await,
        Err(MtrError::NotFound(_))
    ));

    let new = engine.identities.resolve(EntityKind::Device, "TAUP").await.unwrap();
    assert!(new.was_created());
    assert_ne!(new.pk(), old);
}

#[tokio::test]
async fn unknown_type_and_wrong_entity_kind_are_rejected_before_resolution() {
    let engine = Engine::new();

    let err = engine.ingest.ingest(gauge("TAUP", "humidity", at(0, 0), 1.0)).await.unwrap_err();
    assert!(matches!(err, MtrError::Validation(_)));

    let mut request = gauge("TAUP", "voltage", at(0, 0), 1.0);
    request.entity_kind = Some(EntityKind::Site);
    let err = engine.ingest.ingest(request).await.unwrap_err();
    assert!(matches!(err, MtrError::Validation(_)));

    assert_eq!(engine.identities_store.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn counters_and_timers_merge_without_rate_limit() {
    let engine = Engine::new();
    for count in ["4", "6"] {
        let request = SampleRequest {
            entity_id: "geonet-api".into(),
            type_id: "http.requests".into(),
            time: at(2, 0).to_rfc3339(),
            count: Some(count.into()),
            ..SampleRequest::default()
        };
        assert!(!engine.ingest.ingest(request).await.unwrap().is_rate_limited());
    }
    let timer = SampleRequest {
        entity_id: "geonet-api".into(),
        type_id: "db.query".into(),
        time: at(2, 30).to_rfc3339(),
        total: Some("90".into()),
        count: Some("3".into()),
        ..SampleRequest::default()
    };
    engine.ingest.ingest(timer).await.unwrap();

    let buckets = engine
        .series
        .buckets(
            EntityKind::Application,
            "geonet-api",
            "http.requests",
            Resolution::FiveMinute,
            at(0, 0),
            at(59, 0),
        )
        .await
        .unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].aggregate, BucketAggregate::Counter { count: 10 });

    let latest =
        engine.series.latest(EntityKind::Application, "geonet-api", "db.query").await.unwrap();
    assert!((latest.value - 30.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn retention_removes_only_expired_buckets() {
    let engine = Engine::new();
    let series = SeriesKey::new(Pk(1), Pk(1));
    let now = at(30, 0);
    let config = RetentionConfig { keep_minute: 10, ..RetentionConfig::default() };
    let expired = BucketKey::containing(series, Resolution::Minute, now - Duration::minutes(11));
    let kept = BucketKey::containing(series, Resolution::Minute, now - Duration::minutes(9));
    let hourly = BucketKey::containing(series, Resolution::Hour, now - Duration::hours(11));
    for key in [expired, kept, hourly] {
        engine.series_store.seed_bucket(key, BucketAggregate::Counter { count: 1 });
    }

    let sweeper = RetentionSweeper::from_config(engine.series_store.clone(), &config);
    let report = sweeper.sweep(now).await;

    assert!(report.is_clean());
    assert_eq!(report.deleted.get(&Resolution::Minute), Some(&1));
    assert!(engine.series_store.bucket(&expired).is_none());
    assert!(engine.series_store.bucket(&kept).is_some());
    assert!(engine.series_store.bucket(&hourly).is_some());
}

#[tokio::test]
async fn failed_sweep_is_reported_not_raised() {
    let engine = Engine::new();
    engine.series_store.fail_deletes.store(true, Ordering::SeqCst);
    let sweeper =
        RetentionSweeper::from_config(engine.series_store.clone(), &RetentionConfig::default());

    let report = sweeper.sweep(at(0, 0)).await;

    assert_eq!(report.failures.len(), Resolution::ALL.len());
    assert_eq!(report.total_deleted(), 0);
}

#[tokio::test]
async fn tags_attach_to_existing_series_only() {
    let engine = Engine::new();
    let tags = TagService::new(engine.series.clone(), engine.series_store.clone());

    let err = tags.add(EntityKind::Device, "TAUP", "voltage", "TAUP").await.unwrap_err();
    assert!(matches!(err, MtrError::NotFound(_)));

    engine.ingest.ingest(gauge("TAUP", "voltage", at(0, 0), 1.0)).await.unwrap();
    assert!(tags.add(EntityKind::Device, "TAUP", "voltage", "TAUP").await.unwrap());
    assert!(!tags.add(EntityKind::Device, "TAUP", "voltage", "TAUP").await.unwrap());
    assert_eq!(tags.tags(EntityKind::Device, "TAUP", "voltage").await.unwrap(), vec!["TAUP"]);

    tags.remove(EntityKind::Device, "TAUP", "voltage", "TAUP").await.unwrap();
    let err = tags.remove(EntityKind::Device, "TAUP", "voltage", "TAUP").await.unwrap_err();
    assert!(matches!(err, MtrError::NotFound(_)));
}

fn counter(instance: Option<&str>, count: i64) -> SampleRequest {
    SampleRequest {
        entity_id: "geonet-api".into(),
        type_id: "http.requests".into(),
        instance: instance.map(Into::into),
        time: at(3, 0).to_rfc3339(),
        count: Some(count.to_string()),
        ..SampleRequest::default()
    }
}

#[tokio::test]
async fn counters_from_each_instance_keep_their_own_series() {
    let engine = Engine::new();
    engine.ingest.ingest(counter(Some("web-1"), 4)).await.unwrap();
    engine.ingest.ingest(counter(Some("web-2"), 7)).await.unwrap();
    engine.ingest.ingest(counter(Some("web-1"), 1)).await.unwrap();
    engine.ingest.ingest(counter(None, 2)).await.unwrap();

    assert_eq!(engine.identities_store.count(EntityKind::Instance), 2);
    assert_eq!(engine.identities_store.count(EntityKind::Application), 1);

    let app = EntityKind::Application;
    let mut counts = Vec::new();
    for instance in [Some("web-1"), Some("web-2"), None] {
        let series = engine
            .series
            .scoped_series(app, "geonet-api", "http.requests", instance)
            .await
            .unwrap();
        let bucket = BucketKey::containing(series, Resolution::FiveMinute, at(3, 0));
        counts.push(engine.series_store.bucket(&bucket));
    }
    assert_eq!(
        counts,
        [4 + 1, 7, 2].map(|count| Some(BucketAggregate::Counter { count })).to_vec()
    );

    let web_2 = engine
        .series
        .scoped_series(app, "geonet-api", "http.requests", Some("web-2"))
        .await
        .unwrap();
    assert!((engine.series.latest_of(web_2).await.unwrap().value - 7.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn scope_reference_must_match_the_family() {
    let engine = Engine::new();

    let mut request = counter(None, 1);
    request.source = Some("handler".into());
    let err = engine.ingest.ingest(request).await.unwrap_err();
    assert!(matches!(err, MtrError::Validation(_)));

    let mut request = gauge("TAUP", "voltage", at(0, 0), 1.0);
    request.instance = Some("web-1".into());
    let err = engine.ingest.ingest(request).await.unwrap_err();
    assert!(matches!(err, MtrError::Validation(_)));

    assert_eq!(engine.identities_store.inserts.load(Ordering::SeqCst), 0);

    engine.ingest.ingest(counter(None, 1)).await.unwrap();
    let err = engine
        .series
        .scoped_series(EntityKind::Application, "geonet-api", "http.requests", Some("web-9"))
        .await
        .unwrap_err();
    assert!(matches!(err, MtrError::NotFound(_)));
}
