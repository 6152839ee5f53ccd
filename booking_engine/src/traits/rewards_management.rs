use wb_common::Points;

use crate::{
    db_types::{NewRedemption, NewRewardTransaction, OrderId, Redemption, RewardTransaction, RewardWallet},
    traits::{BookingError, Pagination, RecordOutcome, ReservationOutcome},
};

/// Storage behaviour for reward wallets, the transaction ledger and redemption reservations.
///
/// Wallet balances are only ever changed by [`RewardsManagement::record_transaction`] (directly, or via
/// [`RewardsManagement::complete_redemption`]).
#[allow(async_fn_in_trait)]
pub trait RewardsManagement {
    async fn fetch_wallet(&self, user_id: &str) -> Result<Option<RewardWallet>, BookingError>;

    /// Creates an empty wallet for the user if they don't have one yet. The flag is true if the wallet was created by
    /// this call.
    async fn create_wallet_if_absent(&self, user_id: &str) -> Result<(RewardWallet, bool), BookingError>;

    /// Writes a ledger entry and applies it to the user's wallet in one atomic step.
    ///
    /// If the entry carries a reference id and a matching entry already exists, nothing is written and the existing
    /// id is returned as [`RecordOutcome::AlreadyExists`].
    async fn record_transaction(&self, tx: NewRewardTransaction) -> Result<RecordOutcome, BookingError>;

    /// A user's ledger, newest first.
    async fn fetch_transactions(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> Result<Vec<RewardTransaction>, BookingError>;

    /// The sum of the user's pending reservations.
    async fn pending_reserved_points(&self, user_id: &str) -> Result<Points, BookingError>;

    /// Creates a pending reservation. If the order already has one, the existing reservation is returned and the flag
    /// is false.
    ///
    /// Fails with [`InsufficientPoints`](crate::traits::RewardsError::InsufficientPoints) if the user's available
    /// balance, less their other pending reservations, does not cover the reservation. The check and the insert are
    /// atomic with respect to other reservations for the same user.
    async fn insert_pending_redemption(&self, redemption: NewRedemption) -> Result<(Redemption, bool), BookingError>;

    async fn fetch_redemption_for_order(&self, order_id: &OrderId) -> Result<Option<Redemption>, BookingError>;

    /// Moves a pending reservation to `completed` and debits the reserved points from the wallet.
    async fn complete_redemption(&self, order_id: &OrderId) -> Result<ReservationOutcome, BookingError>;

    /// Moves a pending reservation to `cancelled`. The wallet is not touched.
    async fn cancel_redemption(&self, order_id: &OrderId) -> Result<ReservationOutcome, BookingError>;
}
