//! Metric taxonomy and downsampling resolutions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{EntityKind, Pk};
use super::sample::ValueKind;

/// A family of metric types sharing value kind, entity kind and resolution
/// plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFamily {
    /// Gauges reported by field devices (voltage, temperature, ...).
    Field,
    /// Gauges describing data latency at monitoring sites.
    Latency,
    /// Application counters.
    Counter,
    /// Application timer summaries.
    Timer,
}

crate::impl_domain_enum_conversions!(MetricFamily {
    Field => "field",
    Latency => "latency",
    Counter => "counter",
    Timer => "timer",
});

impl MetricFamily {
    pub const ALL: [Self; 4] = [Self::Field, Self::Latency, Self::Counter, Self::Timer];

    /// The shape of values samples of this family carry.
    pub const fn value_kind(self) -> ValueKind {
        match self {
            Self::Field | Self::Latency => ValueKind::Gauge,
            Self::Counter => ValueKind::Counter,
            Self::Timer => ValueKind::Timer,
        }
    }

    /// The kind of entity that reports this family.
    pub const fn entity_kind(self) -> EntityKind {
        match self {
            Self::Field => EntityKind::Device,
            Self::Latency => EntityKind::Site,
            Self::Counter | Self::Timer => EntityKind::Application,
        }
    }

    /// Families reported by entities of `kind`.
    pub const fn for_entity_kind(kind: EntityKind) -> &'static [Self] {
        match kind {
            EntityKind::Device => &[Self::Field],
            EntityKind::Site => &[Self::Latency],
            EntityKind::Application => &[Self::Counter, Self::Timer],
            EntityKind::Instance | EntityKind::Source => &[],
        }
    }

    /// The kind of entity that may narrow a series of this family, if any.
    pub const fn scope_kind(self) -> Option<EntityKind> {
        match self {
            Self::Counter => Some(EntityKind::Instance),
            Self::Timer => Some(EntityKind::Source),
            Self::Field | Self::Latency => None,
        }
    }

    /// Families whose series may be narrowed by entities of `kind`.
    pub const fn scoped_by(kind: EntityKind) -> &'static [Self] {
        match kind {
            EntityKind::Instance => &[Self::Counter],
            EntityKind::Source => &[Self::Timer],
            EntityKind::Application | EntityKind::Device | EntityKind::Site => &[],
        }
    }

    /// Resolutions maintained for this family, finest first.
    pub fn default_plan(self) -> Vec<ResolutionPolicy> {
        match self {
            Self::Field | Self::Latency => vec![
                ResolutionPolicy::rate_limited(Resolution::Minute),
                ResolutionPolicy::merge(Resolution::Hour),
                ResolutionPolicy::merge(Resolution::Day),
            ],
            Self::Counter | Self::Timer => vec![
                ResolutionPolicy::merge(Resolution::FiveMinute),
                ResolutionPolicy::merge(Resolution::Hour),
                ResolutionPolicy::merge(Resolution::Day),
            ],
        }
    }
}

/// A taxonomy entry describing one kind of measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricType {
    pub pk: Pk,
    pub type_id: String,
    pub family: MetricFamily,
    /// Multiplier applied to stored values for display.
    pub scale: f64,
    pub unit: String,
    pub display: String,
}

impl MetricType {
    pub const fn value_kind(&self) -> ValueKind {
        self.family.value_kind()
    }

    /// Stored value converted to display units.
    pub fn scaled(&self, value: f64) -> f64 {
        value * self.scale
    }
}

/// Downsampling granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Minute,
    FiveMinute,
    Hour,
    Day,
}

crate::impl_domain_enum_conversions!(Resolution {
    Minute => "minute",
    FiveMinute => "five_minute",
    Hour => "hour",
    Day => "day",
});

impl Resolution {
    pub const ALL: [Self; 4] = [Self::Minute, Self::FiveMinute, Self::Hour, Self::Day];

    /// Width of one bucket in seconds.
    pub const fn seconds(self) -> i64 {
        match self {
            Self::Minute => 60,
            Self::FiveMinute => 300,
            Self::Hour => 3_600,
            Self::Day => 86_400,
        }
    }

    pub fn duration(self) -> chrono::Duration {
        chrono::Duration::seconds(self.seconds())
    }

    /// Start of the bucket containing `time`.
    pub fn truncate(self, time: DateTime<Utc>) -> DateTime<Utc> {
        truncate_to(time, self.seconds())
    }
}

/// Truncate `time` down to a multiple of `width_secs` since the epoch.
///
/// Widths below one second are treated as one second.
pub fn truncate_to(time: DateTime<Utc>, width_secs: i64) -> DateTime<Utc> {
    let width = width_secs.max(1);
    let ts = time.timestamp();
    let start = ts - ts.rem_euclid(width);
    DateTime::from_timestamp(start, 0).unwrap_or(time)
}

/// How a resolution treats a second sample landing in an existing bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Only the first sample per rate-limit window creates a bucket; later
    /// ones are rejected.
    RateLimited,
    /// Every sample is merged into the bucket's running aggregate.
    Merge,
}

/// One resolution of a family's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPolicy {
    pub resolution: Resolution,
    pub mode: WriteMode,
}

impl ResolutionPolicy {
    pub const fn rate_limited(resolution: Resolution) -> Self {
        Self { resolution, mode: WriteMode::RateLimited }
    }

    pub const fn merge(resolution: Resolution) -> Self {
        Self { resolution, mode: WriteMode::Merge }
    }
}
