//! Sample ingestion entry point

pub mod service;

pub use service::IngestService;
