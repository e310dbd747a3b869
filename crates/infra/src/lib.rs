//! # MTR Infrastructure
//!
//! Infrastructure implementations of the core storage ports.
//!
//! This crate contains:
//! - SQLite repositories for identities, buckets, latest values and tags
//! - Per-family tag search sources
//! - Configuration loading from environment and files
//! - The cron-driven retention scheduler
//!
//! ## Architecture
//! - Implements traits defined in `mtr-core`
//! - Depends on `mtr-common` for pooled SQLite access
//! - Contains all I/O

pub mod config;
pub mod database;
pub mod errors;
pub mod scheduling;

pub use database::*;
pub use errors::InfraError;
