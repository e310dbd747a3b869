//! Metric type taxonomy lookups

pub mod ports;
pub mod service;

pub use service::MetricTypeRegistry;
