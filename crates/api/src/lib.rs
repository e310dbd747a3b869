//! # MTR API
//!
//! Application layer - wiring and process bootstrap.
//!
//! This crate contains:
//! - The engine context (dependency injection)
//! - Logging setup, health reporting and error labelling for outer layers
//! - The `mtrd` daemon entry point
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires the SQLite adapters into the core services

pub mod context;
pub mod utils;

pub use context::*;
