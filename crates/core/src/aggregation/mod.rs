//! Aggregation store adapter
//!
//! Turns one resolved sample into bucket writes across the resolutions of
//! its metric family, plus a latest-value upsert.

pub mod ports;
pub mod service;

pub use ports::{insert_then_merge, BucketStore, InsertOutcome, LatestStore};
pub use service::AggregationService;
