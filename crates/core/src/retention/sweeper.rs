//! Retention sweeper
//!
//! Each resolution is swept with its own bulk delete. A failure in one
//! resolution is recorded and logged and the sweep moves on; the next tick
//! retries it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use mtr_domain::{MtrError, Resolution, RetentionConfig};
use tracing::{debug, info, instrument, warn};

use super::ports::RetentionStore;

/// A resolution whose delete failed during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub resolution: Resolution,
    pub error: MtrError,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Rows deleted per resolution that swept cleanly.
    pub deleted: BTreeMap<Resolution, usize>,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn total_deleted(&self) -> usize {
        self.deleted.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct RetentionSweeper {
    store: Arc<dyn RetentionStore>,
    windows: Vec<(Resolution, Duration)>,
}

impl RetentionSweeper {
    /// Sweep the given resolutions, each keeping buckets younger than its
    /// window.
    pub fn new(store: Arc<dyn RetentionStore>, windows: Vec<(Resolution, Duration)>) -> Self {
        Self { store, windows }
    }

    /// Sweep every resolution with the windows from `config`.
    pub fn from_config(store: Arc<dyn RetentionStore>, config: &RetentionConfig) -> Self {
        let windows = Resolution::ALL.iter().map(|r| (*r, config.window(*r))).collect();
        Self::new(store, windows)
    }

    pub fn windows(&self) -> &[(Resolution, Duration)] {
        &self.windows
    }

    /// Delete buckets older than their resolution's window as of `now`.
    ///
    /// Never fails as a whole; per-resolution failures land in the report.
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for &(resolution, window) in &self.windows {
            let Some(cutoff) = now.checked_sub_signed(window) else {
                debug!(%resolution, "retention window reaches past the earliest time");
                report.deleted.insert(resolution, 0);
                continue;
            };
            match self.store.delete_before(resolution, cutoff).await {
                Ok(deleted) => {
                    debug!(%resolution, deleted, cutoff = %cutoff, "retention swept");
                    report.deleted.insert(resolution, deleted);
                }
                Err(error) => {
                    warn!(%resolution, %error, "retention sweep failed; retrying next tick");
                    report.failures.push(SweepFailure { resolution, error });
                }
            }
        }

        if report.total_deleted() > 0 {
            info!(deleted = report.total_deleted(), "expired buckets removed");
        }
        report
    }
}
