//! Port interfaces for tag storage and per-family tag search

use async_trait::async_trait;
use mtr_domain::{MetricFamily, Result, SeriesKey, TaggedSeries};

/// Tag associations on `(entity, type)` series.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Attach `tag`; returns `Ok(false)` if it was already attached.
    async fn add_tag(&self, series: SeriesKey, tag: &str) -> Result<bool>;

    /// Detach `tag`; returns `Ok(false)` if it was not attached.
    async fn remove_tag(&self, series: SeriesKey, tag: &str) -> Result<bool>;

    /// Tags on `series`, sorted.
    async fn tags_for(&self, series: SeriesKey) -> Result<Vec<String>>;
}

/// One metric family's half of a tag search.
///
/// Each source runs independently; rows keep the order the source returns
/// them in.
#[async_trait]
pub trait TagSearchSource: Send + Sync {
    fn family(&self) -> MetricFamily;

    async fn search(&self, tag: &str) -> Result<Vec<TaggedSeries>>;
}
