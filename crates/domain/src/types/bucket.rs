//! Durable aggregation buckets and record outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::SeriesKey;
use super::metric::Resolution;
use super::sample::{SampleValue, ValueKind};

/// Unique key of one bucket row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub series: SeriesKey,
    pub resolution: Resolution,
    pub start: DateTime<Utc>,
}

impl BucketKey {
    /// Key of the `resolution` bucket that `time` falls into.
    pub fn containing(series: SeriesKey, resolution: Resolution, time: DateTime<Utc>) -> Self {
        Self { series, resolution, start: resolution.truncate(time) }
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} start={}", self.resolution, self.series, self.start.timestamp())
    }
}

/// Running aggregate held by a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketAggregate {
    /// Online mean of every gauge value merged into the bucket.
    Gauge { average: f64, count: i64 },
    /// Running sum of counter increments.
    Counter { count: i64 },
    /// Running totals of timer summaries.
    Timer { total: f64, count: i64 },
}

impl BucketAggregate {
    /// Aggregate of a freshly created bucket holding only `value`.
    pub const fn first(value: SampleValue) -> Self {
        match value {
            SampleValue::Gauge { value } => Self::Gauge { average: value, count: 1 },
            SampleValue::Counter { count } => Self::Counter { count },
            SampleValue::Timer { total, count } => Self::Timer { total, count },
        }
    }

    /// Fold `value` into this aggregate.
    ///
    /// Gauges use the online mean `(v + avg * n) / (n + 1)`; counters and
    /// timers add. A value of a different kind leaves the aggregate as is.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn merge(self, value: SampleValue) -> Self {
        match (self, value) {
            (Self::Gauge { average, count }, SampleValue::Gauge { value }) => Self::Gauge {
                average: (value + average * count as f64) / (count + 1) as f64,
                count: count + 1,
            },
            (Self::Counter { count }, SampleValue::Counter { count: add }) => {
                Self::Counter { count: count + add }
            }
            (Self::Timer { total, count }, SampleValue::Timer { total: t, count: c }) => {
                Self::Timer { total: total + t, count: count + c }
            }
            (unchanged, _) => unchanged,
        }
    }

    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Gauge { .. } => ValueKind::Gauge,
            Self::Counter { .. } => ValueKind::Counter,
            Self::Timer { .. } => ValueKind::Timer,
        }
    }

    /// Number of observations merged (gauges, timers) or the counter sum.
    pub const fn count(&self) -> i64 {
        match *self {
            Self::Gauge { count, .. } | Self::Counter { count } | Self::Timer { count, .. } => {
                count
            }
        }
    }

    /// Display value: the mean for gauges and timers, the sum for counters.
    #[allow(clippy::cast_precision_loss)]
    pub fn value(&self) -> f64 {
        match *self {
            Self::Gauge { average, .. } => average,
            Self::Counter { count } => count as f64,
            Self::Timer { total, count } if count > 0 => total / count as f64,
            Self::Timer { .. } => 0.0,
        }
    }
}

/// A committed bucket row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: BucketKey,
    pub aggregate: BucketAggregate,
}

/// What a single bucket write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketWrite {
    /// A new bucket was inserted.
    Created,
    /// An existing bucket absorbed the sample.
    Merged,
    /// A native single-statement upsert ran; which branch it took is not
    /// reported by the store.
    Upserted,
}

/// Most recent value of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatestValue {
    pub series: SeriesKey,
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// Result of recording one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// The sample was folded into every resolution of the plan.
    Recorded {
        writes: Vec<(Resolution, BucketWrite)>,
        /// Whether the latest-value row now reflects this sample.
        latest_updated: bool,
    },
    /// The raw resolution already holds a sample for this window; no bucket
    /// was touched.
    RateLimited { resolution: Resolution, bucket_start: DateTime<Utc>, latest_updated: bool },
}

impl RecordOutcome {
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Convert a rate-limited outcome into an error for callers that treat
    /// it as one.
    ///
    /// # Errors
    /// `MtrError::RateLimited` when the sample was rate limited.
    pub fn into_result(self) -> crate::Result<Self> {
        match self {
            Self::RateLimited { resolution, bucket_start, .. } => {
                Err(crate::MtrError::RateLimited(format!(
                    "{resolution} bucket at {} already recorded",
                    bucket_start.to_rfc3339()
                )))
            }
            recorded => Ok(recorded),
        }
    }
}
