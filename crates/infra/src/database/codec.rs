//! Table names and row conversions shared by the repositories
//!
//! Table names are fixed per enum variant and never come from input, so
//! they are safe to splice into SQL text.

use chrono::{DateTime, Utc};
use mtr_domain::{BucketAggregate, EntityKind, Pk, Resolution, SampleValue, SeriesKey, ValueKind};
use rusqlite::types::Type;
use rusqlite::Row;

pub(crate) const fn entity_table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Application => "application",
        EntityKind::Instance => "instance",
        EntityKind::Source => "source",
        EntityKind::Device => "device",
        EntityKind::Site => "site",
    }
}

pub(crate) const fn bucket_table(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::Minute => "bucket_minute",
        Resolution::FiveMinute => "bucket_five_minute",
        Resolution::Hour => "bucket_hour",
        Resolution::Day => "bucket_day",
    }
}

/// Stored `scope_pk` of a series. Unscoped series use 0, which AUTOINCREMENT
/// never hands out.
pub(crate) fn scope_column(series: SeriesKey) -> i64 {
    series.scope.map_or(0, Pk::get)
}

/// Column values of a bucket holding only `value`: kind, average, total,
/// count.
pub(crate) fn first_columns(value: SampleValue) -> (&'static str, f64, f64, i64) {
    match value {
        SampleValue::Gauge { value } => (ValueKind::Gauge.as_str(), value, 0.0, 1),
        SampleValue::Counter { count } => (ValueKind::Counter.as_str(), 0.0, 0.0, count),
        SampleValue::Timer { total, count } => (ValueKind::Timer.as_str(), 0.0, total, count),
    }
}

/// Decode `kind, average, total, count` starting at column `offset`.
pub(crate) fn aggregate_from_row(
    row: &Row<'_>,
    offset: usize,
) -> rusqlite::Result<BucketAggregate> {
    let raw_kind: String = row.get(offset)?;
    let kind = raw_kind.parse::<ValueKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(offset, Type::Text, Box::new(e))
    })?;
    let average: f64 = row.get(offset + 1)?;
    let total: f64 = row.get(offset + 2)?;
    let count: i64 = row.get(offset + 3)?;

    Ok(match kind {
        ValueKind::Gauge => BucketAggregate::Gauge { average, count },
        ValueKind::Counter => BucketAggregate::Counter { count },
        ValueKind::Timer => BucketAggregate::Timer { total, count },
    })
}

pub(crate) fn time_from_secs(column: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, secs))
}

pub(crate) fn time_from_millis(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, millis))
}
