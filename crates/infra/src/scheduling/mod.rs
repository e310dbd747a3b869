//! Scheduling infrastructure for background tasks
//!
//! The retention scheduler drives periodic bucket sweeps. It has an
//! explicit start/stop lifecycle, a tracked monitor task, cancellation
//! support, and timeouts on every scheduler operation.

pub mod error;
pub mod retention_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use retention_scheduler::{RetentionScheduler, RetentionSchedulerConfig, SweepStats};
