//! Series query service

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mtr_domain::{Bucket, EntityKind, LatestValue, MtrError, Resolution, Result, SeriesKey};
use tracing::instrument;

use super::ports::SeriesReader;
use crate::identity::IdentityCache;
use crate::registry::MetricTypeRegistry;

/// Reads latest values and bucket ranges by external identifiers.
///
/// Uses read-only identity lookup: querying an unknown entity is
/// `NotFound` and never creates it.
pub struct SeriesService {
    identities: Arc<IdentityCache>,
    registry: Arc<MetricTypeRegistry>,
    reader: Arc<dyn SeriesReader>,
}

impl SeriesService {
    pub fn new(
        identities: Arc<IdentityCache>,
        registry: Arc<MetricTypeRegistry>,
        reader: Arc<dyn SeriesReader>,
    ) -> Self {
        Self { identities, registry, reader }
    }

    /// Resolve an existing series.
    ///
    /// # Errors
    /// `Validation` if the type is unknown or not reported by `kind`,
    /// `NotFound` if the entity does not exist.
    pub async fn series(&self, kind: EntityKind, id: &str, type_id: &str) -> Result<SeriesKey> {
        self.scoped_series(kind, id, type_id, None).await
    }

    /// Resolve an existing series narrowed to the instance or source `scope`.
    ///
    /// # Errors
    /// As [`Self::series`], plus `Validation` when the family takes no scope
    /// and `NotFound` for an unknown scope identity.
    pub async fn scoped_series(
        &self,
        kind: EntityKind,
        id: &str,
        type_id: &str,
        scope: Option<&str>,
    ) -> Result<SeriesKey> {
        let metric_type = self.registry.get(type_id).await?;
        let family = metric_type.family;
        if family.entity_kind() != kind {
            return Err(MtrError::Validation(format!(
                "metric type {type_id:?} is not reported by {kind} entities"
            )));
        }
        let scope_pk = match (scope, family.scope_kind()) {
            (None, _) => None,
            (Some(scope_id), Some(scope_kind)) => {
                Some(self.identities.lookup(scope_kind, scope_id).await?)
            }
            (Some(_), None) => {
                return Err(MtrError::Validation(format!(
                    "metric type {type_id:?} series are not scoped"
                )));
            }
        };
        let entity_pk = self.identities.lookup(kind, id).await?;
        Ok(SeriesKey::new(entity_pk, metric_type.pk).scoped(scope_pk))
    }

    /// Latest value of a series.
    ///
    /// # Errors
    /// `NotFound` when the entity is unknown or nothing was recorded yet.
    #[instrument(skip(self))]
    pub async fn latest(&self, kind: EntityKind, id: &str, type_id: &str) -> Result<LatestValue> {
        let series = self.series(kind, id, type_id).await?;
        self.latest_of(series).await
    }

    /// Latest value of an already resolved series.
    ///
    /// # Errors
    /// `NotFound` when nothing was recorded yet.
    pub async fn latest_of(&self, series: SeriesKey) -> Result<LatestValue> {
        self.reader
            .latest(series)
            .await
            .map_err(|e| e.context(format!("latest {series}")))?
            .ok_or_else(|| MtrError::NotFound(format!("no samples for {series}")))
    }

    /// Buckets of a series in `[from, to]`, ascending by start.
    ///
    /// # Errors
    /// `Validation` for an inverted range; `NotFound` for an unknown entity.
    #[instrument(skip(self))]
    pub async fn buckets(
        &self,
        kind: EntityKind,
        id: &str,
        type_id: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bucket>> {
        if from > to {
            return Err(MtrError::validation("range start must not be after its end"));
        }
        let series = self.series(kind, id, type_id).await?;
        self.buckets_of(series, resolution, from, to).await
    }

    /// Buckets of an already resolved series in `[from, to]`.
    ///
    /// # Errors
    /// `Validation` for an inverted range.
    pub async fn buckets_of(
        &self,
        series: SeriesKey,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bucket>> {
        if from > to {
            return Err(MtrError::validation("range start must not be after its end"));
        }
        self.reader
            .buckets(series, resolution, from, to)
            .await
            .map_err(|e| e.context(format!("buckets {resolution} {series}")))
    }
}
