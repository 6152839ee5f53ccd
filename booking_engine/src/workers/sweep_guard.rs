use std::{
    fmt::Display,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use tokio::{
    sync::{Mutex as AsyncMutex, MutexGuard},
    time::Instant,
};

/// Single-flight guard for a periodic job.
///
/// A run may only start if no other run holds the guard, and at least `min_spacing` has passed since the last run
/// started. Callers that are refused skip their run rather than wait.
#[derive(Debug)]
pub struct SweepGuard {
    running: AsyncMutex<()>,
    last_started: Mutex<Option<Instant>>,
    min_spacing: Duration,
}

/// Held for the duration of a run.
#[derive(Debug)]
pub struct SweepPermit<'a> {
    _running: MutexGuard<'a, ()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepSkipped {
    AlreadyRunning,
    TooSoon { wait: Duration },
}

impl Display for SweepSkipped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "another run is in progress"),
            Self::TooSoon { wait } => write!(f, "last run was too recent (next run allowed in {}ms)", wait.as_millis()),
        }
    }
}

impl SweepGuard {
    pub fn new(min_spacing: Duration) -> Self {
        Self { running: AsyncMutex::new(()), last_started: Mutex::new(None), min_spacing }
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    pub fn try_begin(&self) -> Result<SweepPermit<'_>, SweepSkipped> {
        let running = self.running.try_lock().map_err(|_| SweepSkipped::AlreadyRunning)?;
        let now = Instant::now();
        let mut last_started = self.last_started.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = *last_started {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.min_spacing {
                return Err(SweepSkipped::TooSoon { wait: self.min_spacing - elapsed });
            }
        }
        *last_started = Some(now);
        Ok(SweepPermit { _running: running })
    }
}
