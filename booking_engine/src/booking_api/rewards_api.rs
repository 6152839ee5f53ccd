use std::fmt::Debug;

use log::*;
use serde_json::json;
use wb_common::{Paise, Points};

use crate::{
    booking_api::rewards_objects::{RedemptionQuote, ValidatedRedemption},
    db_types::{
        NewRedemption,
        NewRewardTransaction,
        Order,
        OrderId,
        OrderStatusType,
        Redemption,
        RedemptionStatus,
        RewardSource,
        RewardTransaction,
        RewardWallet,
    },
    helpers::{percentage_cap_points, workshop_cap_points, RewardsConfig},
    traits::{BookingError, Pagination, RecordOutcome, ReservationOutcome, RewardsError, RewardsManagement},
};

/// `RewardsApi` owns the reward-points ledger: wallets, manual and automatic credits, redemption reservations and
/// cashback.
#[derive(Clone)]
pub struct RewardsApi<B> {
    db: B,
    config: RewardsConfig,
}

impl<B> Debug for RewardsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RewardsApi ({:?})", self.config)
    }
}

impl<B> RewardsApi<B> {
    pub fn new(db: B, config: RewardsConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &RewardsConfig {
        &self.config
    }
}

impl<B> RewardsApi<B>
where B: RewardsManagement
{
    /// Fetches the user's wallet, creating it on first use. A newly created wallet receives the welcome bonus, if one
    /// is configured.
    pub async fn get_wallet(&self, user_id: &str) -> Result<RewardWallet, BookingError> {
        let (wallet, created) = self.db.create_wallet_if_absent(user_id).await?;
        if !created || !self.config.welcome_bonus.is_positive() {
            return Ok(wallet);
        }
        let bonus = NewRewardTransaction::credit(
            user_id,
            self.config.welcome_bonus,
            RewardSource::WelcomeBonus,
            "Welcome bonus",
        )
        .with_reference(&format!("welcome:{user_id}"));
        let outcome = self.db.record_transaction(bonus).await?;
        info!("🎁️ Welcome bonus of {} for {user_id} recorded as #{}", self.config.welcome_bonus, outcome.id());
        let wallet = self.db.fetch_wallet(user_id).await?.unwrap_or(wallet);
        Ok(wallet)
    }

    pub async fn list_transactions(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> Result<Vec<RewardTransaction>, BookingError> {
        self.db.fetch_transactions(user_id, pagination).await
    }

    /// Records a manual ledger entry, such as an admin adjustment, a referral reward or a refund.
    pub async fn record_transaction(&self, tx: NewRewardTransaction) -> Result<RecordOutcome, BookingError> {
        if !tx.amount.is_positive() {
            return Err(RewardsError::NonPositivePoints.into());
        }
        self.get_wallet(&tx.user_id).await?;
        let outcome = self.db.record_transaction(tx).await?;
        Ok(outcome)
    }

    /// The points a user can commit to a new redemption: the available balance less every pending reservation.
    pub async fn redeemable_balance(&self, user_id: &str) -> Result<Points, BookingError> {
        let available = self.db.fetch_wallet(user_id).await?.map(|w| w.available_balance).unwrap_or_default();
        let pending = self.db.pending_reserved_points(user_id).await?;
        Ok((available - pending).max(Points::default()))
    }

    pub async fn calculate_redemption(&self, user_id: &str, amount: Paise) -> Result<RedemptionQuote, BookingError> {
        let available = self.redeemable_balance(user_id).await?;
        let max_points = self.config.max_redeemable_for(available, amount);
        Ok(RedemptionQuote {
            available_points: available,
            max_points,
            max_discount: max_points.to_paise(self.config.exchange_rate),
            recommended_points: max_points,
            exchange_rate: self.config.exchange_rate,
        })
    }

    /// Checks a redemption of `points` against a booking of `amount` and works out the discount.
    pub async fn validate_redemption(
        &self,
        user_id: &str,
        amount: Paise,
        points: Points,
    ) -> Result<ValidatedRedemption, BookingError> {
        self.validate_redemption_after_release(user_id, amount, points, Points::default()).await
    }

    /// As [`Self::validate_redemption`], counting `released` points of pending reservations that are about to be
    /// cancelled as available.
    pub async fn validate_redemption_after_release(
        &self,
        user_id: &str,
        amount: Paise,
        points: Points,
        released: Points,
    ) -> Result<ValidatedRedemption, BookingError> {
        if !points.is_positive() {
            return Err(RewardsError::NonPositivePoints.into());
        }
        let available = self.redeemable_balance(user_id).await? + released;
        if points > available {
            return Err(RewardsError::InsufficientPoints { requested: points, available }.into());
        }
        let rate = self.config.exchange_rate;
        let pct = self.config.redemption_cap_percentage;
        let pct_cap = percentage_cap_points(amount, pct, rate);
        if points > pct_cap {
            let max_discount = pct_cap.to_paise(rate);
            return Err(RewardsError::ExceedsPercentageCap { percentage: pct, max_discount }.into());
        }
        let workshop_cap = workshop_cap_points(self.config.redemption_cap_per_workshop, rate);
        if points > workshop_cap {
            return Err(RewardsError::ExceedsWorkshopCap { max_discount: workshop_cap.to_paise(rate) }.into());
        }
        let discount = points.to_paise(rate);
        Ok(ValidatedRedemption { points, discount, original_amount: amount, final_amount: amount - discount })
    }

    /// Validates and reserves `points` against an order. The wallet is not touched until the reservation completes.
    ///
    /// If the order already has a reservation, it is returned as is.
    pub async fn redeem(
        &self,
        user_id: &str,
        order_id: &OrderId,
        workshop_id: &str,
        points: Points,
        order_amount: Paise,
    ) -> Result<Redemption, BookingError> {
        if let Some(existing) = self.db.fetch_redemption_for_order(order_id).await? {
            if existing.status == RedemptionStatus::Pending && existing.user_id == user_id {
                debug!("🎁️ Order {order_id} already has a pending reservation of {}", existing.points_reserved);
                return Ok(existing);
            }
            return Err(RewardsError::AlreadyRedeemed(order_id.clone()).into());
        }
        let validated = self.validate_redemption(user_id, order_amount, points).await?;
        let redemption = NewRedemption {
            user_id: user_id.to_string(),
            order_id: order_id.clone(),
            workshop_id: workshop_id.to_string(),
            points_reserved: validated.points,
            discount_amount: validated.discount,
            original_amount: validated.original_amount,
            final_amount: validated.final_amount,
        };
        let (redemption, created) = self.db.insert_pending_redemption(redemption).await?;
        if created {
            let reserved = redemption.points_reserved;
            info!("🎁️ Reserved {reserved} ({}) from {user_id} for order {order_id}", validated.discount);
        }
        Ok(redemption)
    }

    /// Completes the order's pending reservation, debiting the reserved points.
    pub async fn complete_redemption(&self, order_id: &OrderId) -> Result<ReservationOutcome, BookingError> {
        let outcome = self.db.complete_redemption(order_id).await?;
        if let ReservationOutcome::Resolved(r) = &outcome {
            info!("🎁️ Redemption of {} for order {order_id} completed", r.points_reserved);
        }
        Ok(outcome)
    }

    /// Cancels the order's pending reservation. No ledger entry is written.
    pub async fn rollback_redemption(&self, order_id: &OrderId) -> Result<ReservationOutcome, BookingError> {
        let outcome = self.db.cancel_redemption(order_id).await?;
        if let ReservationOutcome::Resolved(r) = &outcome {
            info!("🎁️ Reservation of {} for order {order_id} released", r.points_reserved);
        }
        Ok(outcome)
    }

    /// Brings the order's reservation in line with the order's stored status. Paid orders complete it, other terminal
    /// orders release it, and open orders leave it alone.
    pub async fn settle_reservation_for(&self, order: &Order) -> Result<ReservationOutcome, BookingError> {
        match order.status {
            OrderStatusType::Created => Ok(ReservationOutcome::NoPendingReservation),
            OrderStatusType::Paid => self.complete_redemption(&order.order_id).await,
            OrderStatusType::Failed | OrderStatusType::Cancelled | OrderStatusType::Expired => {
                self.rollback_redemption(&order.order_id).await
            },
        }
    }

    /// Credits cashback for a paid order. Returns the cashback amount and, if it was positive, the ledger outcome.
    ///
    /// Safe to call repeatedly for the same order, since the ledger entry is keyed on the order id.
    pub async fn cashback_for_order(&self, order: &Order) -> Result<(Points, Option<RecordOutcome>), BookingError> {
        let basis = order.cashback_basis();
        let points = self.config.cashback_for(basis);
        if !points.is_positive() {
            return Ok((Points::default(), None));
        }
        self.get_wallet(&order.user_id).await?;
        let tx = NewRewardTransaction::credit(
            &order.user_id,
            points,
            RewardSource::Cashback,
            &format!("Cashback for order {}", order.order_id),
        )
        .with_reference(order.order_id.as_str())
        .with_metadata(json!({
            "basis": basis,
            "percentage": self.config.cashback_percentage,
            "exchange_rate": self.config.exchange_rate,
        }));
        let outcome = self.db.record_transaction(tx).await?;
        Ok((points, Some(outcome)))
    }
}
