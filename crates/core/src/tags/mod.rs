//! Tags and tag fan-out search

pub mod ports;
pub mod search;
pub mod service;

pub use search::TagSearchService;
pub use service::TagService;
