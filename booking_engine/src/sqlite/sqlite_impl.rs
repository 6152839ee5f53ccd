//! `SqliteDatabase` is the SQLite backend for the booking engine. It implements all the traits defined in the
//! [`crate::traits`] module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use serde_json::Value;
use sqlx::{
    migrate::{MigrateDatabase, MigrateError},
    Sqlite,
    SqlitePool,
};
use wb_common::{Paise, Points};

use super::db::{db_url, new_pool, orders, redemptions, rewards, webhooks};
use crate::{
    db_types::{
        GatewayCallback,
        NewOrder,
        NewRedemption,
        NewRewardTransaction,
        Order,
        OrderId,
        OrderStatusType,
        PaymentLink,
        Redemption,
        RedemptionStatus,
        RewardSource,
        RewardTransaction,
        RewardWallet,
        WebhookEvent,
        WebhookOutcome,
    },
    traits::{
        BookingDatabase,
        BookingError,
        OrderManagement,
        OrderQueryFilter,
        Pagination,
        RecordOutcome,
        ReservationOutcome,
        RewardsError,
        RewardsManagement,
        TransitionOutcome,
        WebhookAudit,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl BookingDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), BookingError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::insert_order(order, &mut conn).await?;
        Ok(order)
    }

    /// The cancelling UPDATE is the transaction's first statement, so the write lock is taken before anything is
    /// read.
    async fn replace_open_orders(&self, order: NewOrder) -> Result<(Order, Vec<Order>), BookingError> {
        let mut tx = self.pool.begin().await?;
        let cancelled = orders::cancel_open_orders_for(&order.user_id, &order.workshop_ids, &mut tx).await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok((order, cancelled))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_latest_open_order(&self, user_id: &str, workshop_id: &str) -> Result<Option<Order>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_latest_open_order(user_id, workshop_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_bundle(&self, bundle_id: &str) -> Result<Vec<Order>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_bundle(bundle_id, &mut conn).await?;
        Ok(orders)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn transition_order(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
    ) -> Result<TransitionOutcome, BookingError> {
        let mut conn = self.pool.acquire().await?;
        orders::transition_order(order_id, status, &mut conn)
            .await?
            .ok_or_else(|| BookingError::OrderNotFound(order_id.clone()))
    }

    async fn merge_gateway_metadata(&self, order_id: &OrderId, fields: Value) -> Result<(), BookingError> {
        let mut conn = self.pool.acquire().await?;
        if orders::merge_gateway_metadata(order_id, &fields, &mut conn).await? {
            Ok(())
        } else {
            Err(BookingError::OrderNotFound(order_id.clone()))
        }
    }

    async fn attach_payment_link(&self, order_id: &OrderId, link: &PaymentLink) -> Result<Order, BookingError> {
        let mut conn = self.pool.acquire().await?;
        orders::attach_payment_link(order_id, link, &mut conn)
            .await?
            .ok_or_else(|| BookingError::OrderNotFound(order_id.clone()))
    }

    async fn apply_points_to_order(
        &self,
        order_id: &OrderId,
        points: Points,
        final_amount: Paise,
    ) -> Result<Order, BookingError> {
        let mut conn = self.pool.acquire().await?;
        if let Some(order) = orders::apply_points_to_order(order_id, points, final_amount, &mut conn).await? {
            return Ok(order);
        }
        match orders::fetch_order_by_order_id(order_id, &mut conn).await? {
            Some(order) => Err(BookingError::OrderNotOpen(order_id.clone(), order.status.to_string())),
            None => Err(BookingError::OrderNotFound(order_id.clone())),
        }
    }

    async fn fetch_lapsed_orders(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Order>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_lapsed_orders(now, limit, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_unrewarded_paid_orders(&self, limit: i64) -> Result<Vec<Order>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_unrewarded_paid_orders(limit, &mut conn).await?;
        Ok(orders)
    }

    async fn mark_rewards_generated(&self, order_id: &OrderId, cashback: Points) -> Result<bool, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let marked = orders::mark_rewards_generated(order_id, cashback, &mut conn).await?;
        Ok(marked)
    }
}

impl RewardsManagement for SqliteDatabase {
    async fn fetch_wallet(&self, user_id: &str) -> Result<Option<RewardWallet>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let wallet = rewards::fetch_wallet(user_id, &mut conn).await?;
        Ok(wallet)
    }

    async fn create_wallet_if_absent(&self, user_id: &str) -> Result<(RewardWallet, bool), BookingError> {
        let mut conn = self.pool.acquire().await?;
        let result = rewards::create_wallet_if_absent(user_id, &mut conn).await?;
        Ok(result)
    }

    async fn record_transaction(&self, tx: NewRewardTransaction) -> Result<RecordOutcome, BookingError> {
        let mut db_tx = self.pool.begin().await?;
        let outcome = rewards::record_transaction(&tx, &mut db_tx).await?;
        db_tx.commit().await?;
        Ok(outcome)
    }

    async fn fetch_transactions(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> Result<Vec<RewardTransaction>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let txs = rewards::fetch_transactions(user_id, pagination, &mut conn).await?;
        Ok(txs)
    }

    async fn pending_reserved_points(&self, user_id: &str) -> Result<Points, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let points = redemptions::pending_points_for_user(user_id, &mut conn).await?;
        Ok(points)
    }

    async fn insert_pending_redemption(&self, redemption: NewRedemption) -> Result<(Redemption, bool), BookingError> {
        let mut conn = self.pool.acquire().await?;
        let requested = redemption.points_reserved;
        let user_id = redemption.user_id.clone();
        match redemptions::insert_pending(redemption, &mut conn).await? {
            Some(result) => Ok(result),
            None => {
                let available = redemptions::redeemable_points(&user_id, &mut conn).await?;
                Err(RewardsError::InsufficientPoints { requested, available }.into())
            },
        }
    }

    async fn fetch_redemption_for_order(&self, order_id: &OrderId) -> Result<Option<Redemption>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let redemption = redemptions::fetch_for_order(order_id, &mut conn).await?;
        Ok(redemption)
    }

    /// The status change and the debit are committed together, so a crash can never leave a completed reservation
    /// without its ledger entry.
    async fn complete_redemption(&self, order_id: &OrderId) -> Result<ReservationOutcome, BookingError> {
        let mut tx = self.pool.begin().await?;
        let Some(redemption) = redemptions::resolve(order_id, RedemptionStatus::Completed, &mut tx).await? else {
            return Ok(ReservationOutcome::NoPendingReservation);
        };
        let debit = NewRewardTransaction::debit(
            &redemption.user_id,
            redemption.points_reserved,
            RewardSource::Redemption,
            &format!("Redeemed for order {order_id}"),
        )
        .with_reference(order_id.as_str())
        .with_metadata(serde_json::json!({
            "workshop_id": redemption.workshop_id,
            "discount_amount": redemption.discount_amount,
            "original_amount": redemption.original_amount,
            "final_amount": redemption.final_amount,
        }));
        let outcome = rewards::record_transaction(&debit, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Redemption for order {order_id} completed. Ledger entry #{}", outcome.id());
        Ok(ReservationOutcome::Resolved(redemption))
    }

    async fn cancel_redemption(&self, order_id: &OrderId) -> Result<ReservationOutcome, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let outcome = match redemptions::resolve(order_id, RedemptionStatus::Cancelled, &mut conn).await? {
            Some(r) => ReservationOutcome::Resolved(r),
            None => ReservationOutcome::NoPendingReservation,
        };
        Ok(outcome)
    }
}

impl WebhookAudit for SqliteDatabase {
    async fn insert_webhook_event(&self, callback: &GatewayCallback) -> Result<WebhookEvent, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let event = webhooks::insert_event(callback, &mut conn).await?;
        Ok(event)
    }

    async fn finalise_webhook_event(&self, id: i64, outcome: &WebhookOutcome) -> Result<(), BookingError> {
        let mut conn = self.pool.acquire().await?;
        if !webhooks::finalise_event(id, outcome, &mut conn).await? {
            warn!("🗃️ Webhook event #{id} vanished before it could be finalised");
        }
        Ok(())
    }

    async fn fetch_webhook_event(&self, id: i64) -> Result<Option<WebhookEvent>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let event = webhooks::fetch_event(id, &mut conn).await?;
        Ok(event)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `WB_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Like [`Self::new_with_url`], but creates the database file first if it does not exist yet.
    pub async fn create_if_missing(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        if !Sqlite::database_exists(url).await? {
            info!("🗃️ Database {url} does not exist. Creating it.");
            Sqlite::create_database(url).await?;
        }
        SqliteDatabase::new_with_url(url, max_connections).await
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
