//! Ingest service - validate, resolve, record

use std::sync::Arc;

use mtr_domain::{MtrError, RecordOutcome, Result, SampleRequest, SeriesKey};
use tracing::{debug, instrument};

use crate::aggregation::AggregationService;
use crate::identity::IdentityCache;
use crate::registry::MetricTypeRegistry;

/// Entry point for the boundary layer.
///
/// Validation happens before any identity is created, so a malformed sample
/// never leaves a new entity behind.
pub struct IngestService {
    identities: Arc<IdentityCache>,
    registry: Arc<MetricTypeRegistry>,
    aggregation: Arc<AggregationService>,
}

impl IngestService {
    pub fn new(
        identities: Arc<IdentityCache>,
        registry: Arc<MetricTypeRegistry>,
        aggregation: Arc<AggregationService>,
    ) -> Self {
        Self { identities, registry, aggregation }
    }

    /// Ingest one raw sample.
    ///
    /// # Errors
    /// `Validation` for unknown types, a mismatched entity kind, a scope
    /// reference the family does not take, or unparsable fields; storage
    /// errors propagate.
    #[instrument(
        skip(self, request),
        fields(entity_id = %request.entity_id, type_id = %request.type_id)
    )]
    pub async fn ingest(&self, request: SampleRequest) -> Result<RecordOutcome> {
        let metric_type = self.registry.get(&request.type_id).await?;
        let family = metric_type.family;
        let kind = family.entity_kind();

        if let Some(requested) = request.entity_kind {
            if requested != kind {
                return Err(MtrError::Validation(format!(
                    "metric type {:?} is reported by {kind} entities, not {requested}",
                    metric_type.type_id
                )));
            }
        }

        let scope = request.scope()?;
        if let Some((scope_kind, _)) = scope {
            if family.scope_kind() != Some(scope_kind) {
                return Err(MtrError::Validation(format!(
                    "metric type {:?} does not take a {scope_kind} reference",
                    metric_type.type_id
                )));
            }
        }

        let time = request.parse_time()?;
        let value = request.parse_value(family.value_kind())?;

        let resolved = self.identities.resolve(kind, &request.entity_id).await?;
        if resolved.was_created() {
            debug!(pk = %resolved.pk(), "first sample from new entity");
        }
        let scope_pk = match scope {
            Some((scope_kind, id)) => Some(self.identities.resolve(scope_kind, id).await?.pk()),
            None => None,
        };

        let series = SeriesKey::new(resolved.pk(), metric_type.pk).scoped(scope_pk);
        self.aggregation.record(series, family, time, value).await
    }
}
