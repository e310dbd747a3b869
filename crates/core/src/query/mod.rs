//! Read-side queries over committed series data

pub mod ports;
pub mod service;

pub use service::SeriesService;
