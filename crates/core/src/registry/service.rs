//! Cached metric type registry
//!
//! Types are never created by ingestion, so the whole table is loaded once
//! and served from memory until [`MetricTypeRegistry::reload`].

use std::collections::HashMap;
use std::sync::Arc;

use mtr_domain::{MetricFamily, MetricType, MtrError, Pk, Result};
use parking_lot::RwLock;
use tracing::{debug, info};

use super::ports::MetricTypeStore;

#[derive(Default)]
struct Loaded {
    by_id: HashMap<String, Arc<MetricType>>,
    by_pk: HashMap<Pk, Arc<MetricType>>,
}

pub struct MetricTypeRegistry {
    store: Arc<dyn MetricTypeStore>,
    loaded: RwLock<Option<Arc<Loaded>>>,
}

impl MetricTypeRegistry {
    pub fn new(store: Arc<dyn MetricTypeStore>) -> Self {
        Self { store, loaded: RwLock::new(None) }
    }

    async fn loaded(&self) -> Result<Arc<Loaded>> {
        let cached = self.loaded.read().clone();
        match cached {
            Some(loaded) => Ok(loaded),
            None => self.load().await,
        }
    }

    /// Re-read the taxonomy from storage and return the number of types.
    ///
    /// # Errors
    /// Storage errors propagate; the previous snapshot stays in place.
    pub async fn reload(&self) -> Result<usize> {
        Ok(self.load().await?.by_id.len())
    }

    async fn load(&self) -> Result<Arc<Loaded>> {
        let types = self.store.load_all().await.map_err(|e| e.context("load metric types"))?;

        let mut loaded = Loaded::default();
        for metric_type in types {
            let metric_type = Arc::new(metric_type);
            loaded.by_pk.insert(metric_type.pk, Arc::clone(&metric_type));
            loaded.by_id.insert(metric_type.type_id.clone(), metric_type);
        }
        info!(count = loaded.by_id.len(), "metric types loaded");

        let loaded = Arc::new(loaded);
        *self.loaded.write() = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Look up a type by its external identifier.
    ///
    /// # Errors
    /// `Validation` for an unknown type; ingestion never creates types.
    pub async fn get(&self, type_id: &str) -> Result<Arc<MetricType>> {
        let loaded = self.loaded().await?;
        loaded.by_id.get(type_id).cloned().ok_or_else(|| {
            debug!(type_id, "unknown metric type");
            MtrError::Validation(format!("unknown metric type {type_id:?}"))
        })
    }

    /// Look up a type by its surrogate key.
    ///
    /// # Errors
    /// `NotFound` when no type has this key.
    pub async fn by_pk(&self, pk: Pk) -> Result<Arc<MetricType>> {
        let loaded = self.loaded().await?;
        loaded
            .by_pk
            .get(&pk)
            .cloned()
            .ok_or_else(|| MtrError::NotFound(format!("metric type pk {pk}")))
    }

    /// Every type of `family`, ordered by type id.
    ///
    /// # Errors
    /// Storage errors from the initial load.
    pub async fn family(&self, family: MetricFamily) -> Result<Vec<Arc<MetricType>>> {
        let loaded = self.loaded().await?;
        let mut types: Vec<_> =
            loaded.by_id.values().filter(|t| t.family == family).cloned().collect();
        types.sort_by(|a, b| a.type_id.cmp(&b.type_id));
        Ok(types)
    }
}
