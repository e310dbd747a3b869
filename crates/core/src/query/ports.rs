//! Port interfaces for reading committed series data

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mtr_domain::{Bucket, LatestValue, Resolution, Result, SeriesKey};

#[async_trait]
pub trait SeriesReader: Send + Sync {
    /// Latest value of `series`, if any sample was recorded.
    async fn latest(&self, series: SeriesKey) -> Result<Option<LatestValue>>;

    /// Buckets of `series` at `resolution` whose start lies in
    /// `[from, to]`, ascending by start.
    async fn buckets(
        &self,
        series: SeriesKey,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bucket>>;
}
