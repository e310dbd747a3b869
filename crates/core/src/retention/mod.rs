//! Bucket retention

pub mod ports;
pub mod sweeper;

pub use sweeper::{RetentionSweeper, SweepFailure, SweepReport};
