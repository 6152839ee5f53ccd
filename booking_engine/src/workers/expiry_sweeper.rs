use std::time::Duration;

use chrono::Utc;
use log::*;

use crate::{
    booking_api::rewards_api::RewardsApi,
    db_types::{Order, OrderStatusType},
    helpers::RewardsConfig,
    traits::{BookingDatabase, BookingError},
    workers::{SweepGuard, SweepReport},
};

pub const DEFAULT_EXPIRY_MIN_SPACING: Duration = Duration::from_secs(30);
pub const DEFAULT_BATCH_SIZE: i64 = 100;

/// Expires open orders whose payment link has lapsed.
///
/// The webhook handler may be finishing the same order at the same moment. Each candidate is fetched again just before
/// it is expired, and the expiry itself only applies to orders that are still `created`, so whichever writer comes
/// second leaves the order alone.
pub struct ExpirySweeper<B> {
    db: B,
    rewards: RewardsApi<B>,
    guard: SweepGuard,
    batch_size: i64,
}

impl<B: Clone> ExpirySweeper<B> {
    pub fn new(db: B, rewards_config: RewardsConfig) -> Self {
        let rewards = RewardsApi::new(db.clone(), rewards_config);
        Self { db, rewards, guard: SweepGuard::new(DEFAULT_EXPIRY_MIN_SPACING), batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_min_spacing(mut self, min_spacing: Duration) -> Self {
        self.guard = SweepGuard::new(min_spacing);
        self
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl<B> ExpirySweeper<B>
where B: BookingDatabase
{
    pub async fn run_once(&self) -> Result<SweepReport, BookingError> {
        let _permit = match self.guard.try_begin() {
            Ok(permit) => permit,
            Err(reason) => {
                debug!("🕰️ Expiry sweep skipped: {reason}");
                return Ok(SweepReport::skipped(reason));
            },
        };
        let now = Utc::now();
        let candidates = self.db.fetch_lapsed_orders(now, self.batch_size).await?;
        let mut report = SweepReport::default();
        for candidate in candidates {
            report.examined += 1;
            match self.expire(&candidate).await {
                Ok(true) => report.processed += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    warn!("🕰️ Could not expire order {}. {e}", candidate.order_id);
                    report.failed += 1;
                },
            }
        }
        if report.examined > 0 {
            info!("🕰️ Expiry sweep: {report}");
        }
        Ok(report)
    }

    /// Returns true if this call expired the order.
    async fn expire(&self, candidate: &Order) -> Result<bool, BookingError> {
        let Some(fresh) = self.db.fetch_order(&candidate.order_id).await? else {
            return Ok(false);
        };
        if fresh.status != OrderStatusType::Created || !fresh.link_has_lapsed(Utc::now()) {
            debug!("🕰️ Order {} is {} and no longer due for expiry", fresh.order_id, fresh.status);
            return Ok(false);
        }
        let outcome = self.db.transition_order(&fresh.order_id, OrderStatusType::Expired).await?;
        self.rewards.settle_reservation_for(outcome.order()).await?;
        if outcome.is_applied() {
            debug!("🕰️ Order {} expired", fresh.order_id);
        }
        Ok(outcome.is_applied())
    }
}
