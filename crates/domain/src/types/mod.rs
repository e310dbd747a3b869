//! Domain types and models
//!
//! Identities, metric taxonomy, resolutions, samples, buckets and tags.

pub mod bucket;
pub mod identity;
pub mod metric;
pub mod sample;
pub mod tag;

pub use bucket::{Bucket, BucketAggregate, BucketKey, BucketWrite, LatestValue, RecordOutcome};
pub use identity::{EntityKind, EntityRef, Pk, Resolved, SeriesKey};
pub use metric::{MetricFamily, MetricType, Resolution, ResolutionPolicy, WriteMode};
pub use sample::{SampleRequest, SampleValue, ValueKind};
pub use tag::{TagSearchResult, TaggedSeries};
