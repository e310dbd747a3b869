//! # MTR Core
//!
//! Business logic of the metric ingestion engine - no infrastructure
//! dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for durable storage
//! - The identity cache, aggregation adapter and tag fan-out query
//! - Ingest, series query, tag and retention services
//!
//! ## Architecture Principles
//! - Only depends on `mtr-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod aggregation;
pub mod identity;
pub mod ingest;
pub mod query;
pub mod registry;
pub mod retention;
pub mod tags;

pub use aggregation::ports::{BucketStore, InsertOutcome, LatestStore};
pub use aggregation::AggregationService;
pub use identity::ports::IdentityStore;
pub use identity::{CacheStats, CacheStatsSnapshot, IdentityCache};
pub use ingest::IngestService;
pub use query::ports::SeriesReader;
pub use query::SeriesService;
pub use registry::ports::MetricTypeStore;
pub use registry::MetricTypeRegistry;
pub use retention::ports::RetentionStore;
pub use retention::{RetentionSweeper, SweepFailure, SweepReport};
pub use tags::ports::{TagRepository, TagSearchSource};
pub use tags::{TagSearchService, TagService};
