//! Port interfaces for the metric type taxonomy

use async_trait::async_trait;
use mtr_domain::{MetricType, Result};

/// Read access to the fixed metric type table.
#[async_trait]
pub trait MetricTypeStore: Send + Sync {
    /// Every known metric type.
    async fn load_all(&self) -> Result<Vec<MetricType>>;
}
