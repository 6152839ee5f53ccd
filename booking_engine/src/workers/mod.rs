//! Background jobs. Each job exposes a `run_once` method and owns a [`SweepGuard`]; scheduling is left to the caller.
mod cashback_generator;
mod expiry_sweeper;
mod sweep_guard;

use std::fmt::Display;

pub use cashback_generator::CashbackGenerator;
pub use expiry_sweeper::{ExpirySweeper, DEFAULT_BATCH_SIZE, DEFAULT_EXPIRY_MIN_SPACING};
use serde::Serialize;
pub use sweep_guard::{SweepGuard, SweepPermit, SweepSkipped};

/// Tally of one run of a background job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    #[serde(skip)]
    pub skipped: Option<SweepSkipped>,
    pub examined: usize,
    pub processed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn skipped(reason: SweepSkipped) -> Self {
        Self { skipped: Some(reason), ..Default::default() }
    }

    pub fn was_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

impl Display for SweepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(reason) = &self.skipped {
            return write!(f, "skipped ({reason})");
        }
        write!(
            f,
            "{} examined, {} processed, {} unchanged, {} failed",
            self.examined, self.processed, self.unchanged, self.failed
        )
    }
}
