//! Incoming samples
//!
//! A sample is ephemeral: it is validated, resolved and folded into buckets,
//! never stored as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{validate_identifier, EntityKind};
use crate::{MtrError, Result};

/// Shape of the numeric payload a sample carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Gauge,
    Counter,
    Timer,
}

crate::impl_domain_enum_conversions!(ValueKind {
    Gauge => "gauge",
    Counter => "counter",
    Timer => "timer",
});

/// Numeric payload of a validated sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleValue {
    /// A point-in-time reading.
    Gauge { value: f64 },
    /// Number of events since the last report.
    Counter { count: i64 },
    /// Client-side pre-aggregated timings: sum of durations and how many.
    Timer { total: f64, count: i64 },
}

impl SampleValue {
    pub const fn gauge(value: f64) -> Self {
        Self::Gauge { value }
    }

    pub const fn counter(count: i64) -> Self {
        Self::Counter { count }
    }

    pub const fn timer(total: f64, count: i64) -> Self {
        Self::Timer { total, count }
    }

    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Gauge { .. } => ValueKind::Gauge,
            Self::Counter { .. } => ValueKind::Counter,
            Self::Timer { .. } => ValueKind::Timer,
        }
    }

    /// The single number recorded as the series' latest value.
    #[allow(clippy::cast_precision_loss)]
    pub fn latest_value(&self) -> f64 {
        match *self {
            Self::Gauge { value } => value,
            Self::Counter { count } => count as f64,
            Self::Timer { total, count } => total / count as f64,
        }
    }

    /// Reject payloads no bucket can meaningfully absorb.
    ///
    /// # Errors
    /// `MtrError::Validation` for non-finite numbers, negative counts, or a
    /// timer with no observations.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Gauge { value } if !value.is_finite() => {
                Err(MtrError::validation("gauge value must be finite"))
            }
            Self::Counter { count } if count < 0 => {
                Err(MtrError::validation("counter count must not be negative"))
            }
            Self::Timer { total, .. } if !total.is_finite() || total < 0.0 => {
                Err(MtrError::validation("timer total must be a finite, non-negative number"))
            }
            Self::Timer { count, .. } if count <= 0 => {
                Err(MtrError::validation("timer count must be positive"))
            }
            _ => Ok(()),
        }
    }
}

/// Unparsed sample as handed over by the boundary layer.
///
/// Which numeric fields are required depends on the metric type's family:
/// gauges need `value`, counters `count`, timers `total` and `count`.
/// Counters may name the reporting `instance` and timers the timed `source`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRequest {
    pub entity_kind: Option<EntityKind>,
    pub entity_id: String,
    pub type_id: String,
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    /// RFC 3339 timestamp.
    pub time: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub count: Option<String>,
    #[serde(default)]
    pub total: Option<String>,
}

impl SampleRequest {
    /// Parse the request time.
    ///
    /// # Errors
    /// `MtrError::Validation` if the time is missing or not RFC 3339.
    pub fn parse_time(&self) -> Result<DateTime<Utc>> {
        let raw = self.time.trim();
        if raw.is_empty() {
            return Err(MtrError::validation("time is required"));
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|time| time.with_timezone(&Utc))
            .map_err(|e| MtrError::Validation(format!("invalid time {raw:?}: {e}")))
    }

    /// The instance or source reference carried by the request, if any.
    ///
    /// # Errors
    /// `MtrError::Validation` if both are present or the identifier is
    /// malformed.
    pub fn scope(&self) -> Result<Option<(EntityKind, &str)>> {
        let scope = match (self.instance.as_deref(), self.source.as_deref()) {
            (Some(_), Some(_)) => {
                return Err(MtrError::validation("instance and source are mutually exclusive"));
            }
            (Some(id), None) => Some((EntityKind::Instance, id)),
            (None, Some(id)) => Some((EntityKind::Source, id)),
            (None, None) => None,
        };
        if let Some((kind, id)) = scope {
            validate_identifier(kind, id)?;
        }
        Ok(scope)
    }

    /// Parse the numeric fields required by `kind`.
    ///
    /// Gauge values additionally accept `true`/`false` for boolean state,
    /// stored as 1 and 0.
    ///
    /// # Errors
    /// `MtrError::Validation` if a required field is missing or unparsable,
    /// or the parsed payload fails [`SampleValue::validate`].
    pub fn parse_value(&self, kind: ValueKind) -> Result<SampleValue> {
        let value = match kind {
            ValueKind::Gauge => {
                let raw = required(self.value.as_deref(), "value")?;
                SampleValue::gauge(parse_gauge(raw)?)
            }
            ValueKind::Counter => {
                SampleValue::counter(parse_count(required(self.count.as_deref(), "count")?)?)
            }
            ValueKind::Timer => SampleValue::timer(
                parse_float(required(self.total.as_deref(), "total")?, "total")?,
                parse_count(required(self.count.as_deref(), "count")?)?,
            ),
        };
        value.validate()?;
        Ok(value)
    }
}

fn required<'a>(field: Option<&'a str>, name: &str) -> Result<&'a str> {
    match field.map(str::trim) {
        Some(raw) if !raw.is_empty() => Ok(raw),
        _ => Err(MtrError::Validation(format!("{name} is required"))),
    }
}

fn parse_gauge(raw: &str) -> Result<f64> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Ok(1.0),
        "false" => Ok(0.0),
        _ => parse_float(raw, "value"),
    }
}

fn parse_float(raw: &str, name: &str) -> Result<f64> {
    raw.parse::<f64>().map_err(|e| MtrError::Validation(format!("invalid {name} {raw:?}: {e}")))
}

fn parse_count(raw: &str) -> Result<i64> {
    raw.parse::<i64>().map_err(|e| MtrError::Validation(format!("invalid count {raw:?}: {e}")))
}
