//! Background loops that drive the engine's periodic jobs.
//!
//! Each loop ticks on its own interval and stops when the shutdown channel flips to `true`. A failed run does not
//! stop the loop. The next attempt is brought forward instead.
use std::time::Duration;

use booking_engine::{BookingError, CashbackGenerator, ExpirySweeper, SqliteDatabase, SweepReport};
use log::*;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

use crate::config::ServerConfig;

/// How long to wait before retrying a run that failed outright.
const RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct WorkerHandles {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerHandles {
    /// Signals every worker to stop, and waits for them to finish their current run.
    pub async fn shutdown(self) {
        if self.shutdown.send(true).is_err() {
            debug!("🕰️ All workers had already stopped");
        }
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("🕰️ A worker did not shut down cleanly. {e}");
            }
        }
        info!("🕰️ Workers stopped");
    }
}

/// Starts the expiry sweeper and the cashback generator.
pub fn start_workers(config: &ServerConfig, db: SqliteDatabase) -> WorkerHandles {
    let (tx, rx) = watch::channel(false);
    let workers = config.workers;
    let sweeper = ExpirySweeper::new(db.clone(), config.rewards)
        .with_min_spacing(workers.expiry_min_spacing)
        .with_batch_size(workers.batch_size);
    let generator = CashbackGenerator::new(db, config.rewards).with_batch_size(workers.batch_size);
    let expiry = start_expiry_worker(sweeper, workers.expiry_interval, rx.clone());
    let cashback = start_cashback_worker(generator, workers.cashback_interval, rx);
    WorkerHandles { shutdown: tx, handles: vec![expiry, cashback] }
}

/// The first sweep runs one full interval after startup. Do not await the returned JoinHandle until shutdown has
/// been signalled.
pub fn start_expiry_worker(
    sweeper: ExpirySweeper<SqliteDatabase>,
    period: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("🕰️ Order expiry worker started. Sweeping every {}s", period.as_secs());
        run_loop("expiry sweep", period, false, shutdown, || sweeper.run_once()).await;
        info!("🕰️ Order expiry worker stopped");
    })
}

/// The first run happens immediately, so paid orders left over from before a restart are rewarded promptly.
pub fn start_cashback_worker(
    generator: CashbackGenerator<SqliteDatabase>,
    period: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("🕰️ Cashback worker started. Running every {}s", period.as_secs());
        run_loop("cashback run", period, true, shutdown, || generator.run_once()).await;
        info!("🕰️ Cashback worker stopped");
    })
}

async fn run_loop<F, Fut>(
    name: &str,
    period: Duration,
    run_immediately: bool,
    mut shutdown: watch::Receiver<bool>,
    mut job: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<SweepReport, BookingError>>,
{
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if !run_immediately {
        timer.tick().await;
    }
    loop {
        tokio::select! {
            _ = timer.tick() => {},
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
        match job().await {
            Ok(report) if report.was_skipped() => debug!("🕰️ {name} skipped. {report}"),
            Ok(report) => info!("🕰️ {name} complete. {report}"),
            Err(e) => {
                error!("🕰️ {name} failed. Retrying in {}s. {e}", RETRY_DELAY.as_secs());
                if RETRY_DELAY < period {
                    timer.reset_after(RETRY_DELAY);
                }
            },
        }
    }
}
