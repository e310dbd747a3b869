//! Tag management service

use std::sync::Arc;

use mtr_domain::{validate_tag, EntityKind, MtrError, Result};
use tracing::{info, instrument};

use super::ports::TagRepository;
use crate::query::SeriesService;

pub struct TagService {
    series: Arc<SeriesService>,
    repository: Arc<dyn TagRepository>,
}

impl TagService {
    pub fn new(series: Arc<SeriesService>, repository: Arc<dyn TagRepository>) -> Self {
        Self { series, repository }
    }

    /// Attach `tag` to an existing series. Idempotent.
    ///
    /// # Errors
    /// `Validation` for a malformed tag, `NotFound` for an unknown entity.
    #[instrument(skip(self))]
    pub async fn add(&self, kind: EntityKind, id: &str, type_id: &str, tag: &str) -> Result<bool> {
        validate_tag(tag)?;
        let series = self.series.series(kind, id, type_id).await?;
        let added = self
            .repository
            .add_tag(series, tag)
            .await
            .map_err(|e| e.context(format!("add tag {tag:?} to {series}")))?;
        if added {
            info!("tag attached");
        }
        Ok(added)
    }

    /// Detach `tag` from a series.
    ///
    /// # Errors
    /// `NotFound` when the series does not carry the tag.
    #[instrument(skip(self))]
    pub async fn remove(&self, kind: EntityKind, id: &str, type_id: &str, tag: &str) -> Result<()> {
        validate_tag(tag)?;
        let series = self.series.series(kind, id, type_id).await?;
        let removed = self
            .repository
            .remove_tag(series, tag)
            .await
            .map_err(|e| e.context(format!("remove tag {tag:?} from {series}")))?;
        if removed {
            Ok(())
        } else {
            Err(MtrError::NotFound(format!("tag {tag:?} on {kind} {id:?} {type_id}")))
        }
    }

    /// Tags on a series, sorted.
    ///
    /// # Errors
    /// `NotFound` for an unknown entity.
    pub async fn tags(&self, kind: EntityKind, id: &str, type_id: &str) -> Result<Vec<String>> {
        let series = self.series.series(kind, id, type_id).await?;
        self.repository.tags_for(series).await.map_err(|e| e.context(format!("tags of {series}")))
    }
}
