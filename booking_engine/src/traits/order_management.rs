use chrono::{DateTime, Utc};
use serde_json::Value;
use wb_common::{Paise, Points};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, PaymentLink},
    traits::{BookingError, OrderQueryFilter, TransitionOutcome},
};

/// Storage behaviour for orders.
///
/// The only way an order's status changes is [`OrderManagement::transition_order`], which is conditional on the order
/// still being `created`. This makes every terminal status final no matter how many writers race for it.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a brand-new order in the `created` state and returns it.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, BookingError>;

    /// Cancels every open order the user has for any of the new order's workshops and stores the new order, as one
    /// transaction. Returns the new order and the cancelled ones.
    ///
    /// Concurrent calls for the same user and workshop are serialised, so at most one of their orders is left open.
    async fn replace_open_orders(&self, order: NewOrder) -> Result<(Order, Vec<Order>), BookingError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, BookingError>;

    /// The most recently created order for the user that includes the workshop and is still `created`.
    async fn fetch_latest_open_order(&self, user_id: &str, workshop_id: &str) -> Result<Option<Order>, BookingError>;

    async fn fetch_orders_for_bundle(&self, bundle_id: &str) -> Result<Vec<Order>, BookingError>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, BookingError>;

    /// Moves a `created` order to `status`. Orders already in a terminal state are returned unchanged.
    ///
    /// Returns `OrderNotFound` if there is no such order.
    async fn transition_order(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
    ) -> Result<TransitionOutcome, BookingError>;

    /// Merges `fields` into the order's gateway metadata. Existing keys not named in `fields` are kept. This is
    /// allowed in any state.
    async fn merge_gateway_metadata(&self, order_id: &OrderId, fields: Value) -> Result<(), BookingError>;

    async fn attach_payment_link(&self, order_id: &OrderId, link: &PaymentLink) -> Result<Order, BookingError>;

    /// Records the points applied to an order and the discounted amount the customer will pay.
    async fn apply_points_to_order(
        &self,
        order_id: &OrderId,
        points: Points,
        final_amount: Paise,
    ) -> Result<Order, BookingError>;

    /// `created` orders whose payment link expired before `now`, oldest expiry first.
    async fn fetch_lapsed_orders(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Order>, BookingError>;

    /// `paid` orders for which cashback has not been generated yet, oldest first.
    async fn fetch_unrewarded_paid_orders(&self, limit: i64) -> Result<Vec<Order>, BookingError>;

    /// Flags the order's cashback as generated. Returns false if the flag was already set.
    async fn mark_rewards_generated(&self, order_id: &OrderId, cashback: Points) -> Result<bool, BookingError>;
}
