use std::time::Duration;

use log::*;

use crate::{
    booking_api::rewards_api::RewardsApi,
    db_types::Order,
    helpers::RewardsConfig,
    traits::{BookingDatabase, BookingError},
    workers::{expiry_sweeper::DEFAULT_BATCH_SIZE, SweepGuard, SweepReport},
};

/// Credits cashback for paid orders.
///
/// The ledger entry is keyed on the order id and backed by a unique index, so a batch that is retried after a crash
/// between crediting and flagging an order never pays out twice.
pub struct CashbackGenerator<B> {
    db: B,
    rewards: RewardsApi<B>,
    guard: SweepGuard,
    batch_size: i64,
}

impl<B: Clone> CashbackGenerator<B> {
    pub fn new(db: B, rewards_config: RewardsConfig) -> Self {
        let rewards = RewardsApi::new(db.clone(), rewards_config);
        Self { db, rewards, guard: SweepGuard::new(Duration::ZERO), batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl<B> CashbackGenerator<B>
where B: BookingDatabase
{
    pub async fn run_once(&self) -> Result<SweepReport, BookingError> {
        let _permit = match self.guard.try_begin() {
            Ok(permit) => permit,
            Err(reason) => {
                debug!("🎁️ Cashback run skipped: {reason}");
                return Ok(SweepReport::skipped(reason));
            },
        };
        let orders = self.db.fetch_unrewarded_paid_orders(self.batch_size).await?;
        let mut report = SweepReport::default();
        for order in orders {
            report.examined += 1;
            match self.reward(&order).await {
                Ok(true) => report.processed += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    warn!("🎁️ Could not generate cashback for order {}. {e}", order.order_id);
                    report.failed += 1;
                },
            }
        }
        if report.examined > 0 {
            info!("🎁️ Cashback run: {report}");
        }
        Ok(report)
    }

    /// Returns true if this call flagged the order as rewarded.
    async fn reward(&self, order: &Order) -> Result<bool, BookingError> {
        let (points, outcome) = self.rewards.cashback_for_order(order).await?;
        match outcome {
            Some(o) if o.is_inserted() => info!("🎁️ {points} cashback credited for order {}", order.order_id),
            Some(_) => debug!("🎁️ Cashback for order {} was already credited", order.order_id),
            None => debug!("🎁️ Order {} earns no cashback", order.order_id),
        }
        self.db.mark_rewards_generated(&order.order_id, points).await
    }
}
