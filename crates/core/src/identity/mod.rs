//! Identity resolution
//!
//! Maps stable external identifiers to durable surrogate keys, creating the
//! identity on first use.

pub mod cache;
pub mod ports;

pub use cache::{CacheStats, CacheStatsSnapshot, IdentityCache};
