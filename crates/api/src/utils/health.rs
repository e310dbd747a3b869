//! Health reporting for EngineContext components

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Score at or above which the engine counts as healthy.
const HEALTHY_THRESHOLD: f64 = 0.8;

/// Overall health of the engine
///
/// # Example
/// ```no_run
/// use mtr_lib::utils::health::{ComponentHealth, EngineHealth};
///
/// let mut health = EngineHealth::new()
///     .add_component(ComponentHealth::healthy("database"))
///     .add_component(ComponentHealth::unhealthy("retention", "scheduler not running"));
/// health.calculate_score();
///
/// assert_eq!(health.score, 0.5);
/// assert!(!health.is_healthy);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineHealth {
    pub is_healthy: bool,

    /// Share of healthy components, from 0.0 to 1.0.
    pub score: f64,

    pub message: Option<String>,

    pub components: Vec<ComponentHealth>,

    /// Unix timestamp when the check was performed
    pub timestamp: i64,
}

impl EngineHealth {
    pub fn new() -> Self {
        Self {
            is_healthy: true,
            score: 1.0,
            message: None,
            components: Vec::new(),
            timestamp: Utc::now().timestamp(),
        }
    }

    #[must_use]
    pub fn add_component(mut self, component: ComponentHealth) -> Self {
        self.components.push(component);
        self
    }

    /// Recompute the score from the components added so far.
    ///
    /// Call after all components have been added.
    #[allow(clippy::cast_precision_loss)]
    pub fn calculate_score(&mut self) {
        if self.components.is_empty() {
            return;
        }

        let unhealthy: Vec<&str> =
            self.components.iter().filter(|c| !c.is_healthy).map(|c| c.name.as_str()).collect();
        let healthy_count = self.components.len() - unhealthy.len();

        self.score = healthy_count as f64 / self.components.len() as f64;
        self.is_healthy = self.score >= HEALTHY_THRESHOLD;
        self.message =
            (!unhealthy.is_empty()).then(|| format!("unhealthy: {}", unhealthy.join(", ")));
    }
}

impl Default for EngineHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Health of an individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component identifier (e.g., "database", "retention")
    pub name: String,
    pub is_healthy: bool,
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: true, message: None }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: false, message: Some(message.into()) }
    }
}
