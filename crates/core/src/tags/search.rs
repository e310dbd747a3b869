//! Tag fan-out search
//!
//! One task per metric family runs its search concurrently; the service
//! waits for all of them and merges the rows by family. Any failure fails
//! the whole search, and the first failure to complete is the one
//! reported. Tasks are never cancelled: a sibling's failure does not stop
//! the others from finishing.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use mtr_domain::{validate_tag, MtrError, Result, TagSearchResult};
use tracing::{instrument, warn};

use super::ports::TagSearchSource;

pub struct TagSearchService {
    sources: Vec<Arc<dyn TagSearchSource>>,
}

impl TagSearchService {
    pub fn new(sources: Vec<Arc<dyn TagSearchSource>>) -> Self {
        Self { sources }
    }

    pub fn with_source(mut self, source: Arc<dyn TagSearchSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Search every family for series labelled `tag`.
    ///
    /// # Errors
    /// `Validation` for a malformed tag; otherwise the first sub-query
    /// error in completion order, with its family in the context.
    #[instrument(skip(self))]
    pub async fn search(&self, tag: &str) -> Result<TagSearchResult> {
        validate_tag(tag)?;

        let mut pending: FuturesUnordered<_> = self
            .sources
            .iter()
            .map(|source| {
                let family = source.family();
                let source = Arc::clone(source);
                let tag = tag.to_owned();
                let handle = tokio::spawn(async move { source.search(&tag).await });
                async move { (family, handle.await) }
            })
            .collect();

        let mut result = TagSearchResult::new(tag);
        let mut first_error: Option<MtrError> = None;

        while let Some((family, joined)) = pending.next().await {
            let rows = match joined {
                Ok(Ok(rows)) => rows,
                Ok(Err(err)) => {
                    warn!(%family, error = %err, "tag search failed");
                    if first_error.is_none() {
                        first_error = Some(err.context(format!("search {family}")));
                    }
                    continue;
                }
                Err(join_err) => {
                    warn!(%family, error = %join_err, "tag search task aborted");
                    if first_error.is_none() {
                        first_error = Some(MtrError::Internal(format!(
                            "search {family}: task failed: {join_err}"
                        )));
                    }
                    continue;
                }
            };
            result.families.entry(family).or_default().extend(rows);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(result),
        }
    }
}
