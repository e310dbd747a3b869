//! # MTR Domain
//!
//! Business domain types for the metric ingestion engine.
//!
//! This crate contains:
//! - Identity, metric taxonomy, sample, bucket and tag types
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other MTR crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::identity::validate_identifier;
pub use types::metric::truncate_to;
pub use types::tag::validate_tag;
pub use types::*;
