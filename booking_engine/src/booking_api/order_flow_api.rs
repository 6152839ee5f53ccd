use std::{fmt::Debug, sync::Arc};

use chrono::Utc;
use log::*;
use serde_json::json;
use wb_common::Points;

use crate::{
    booking_api::{
        order_objects::{BookingRequest, RedeemedOrder},
        rewards_api::RewardsApi,
    },
    db_types::{NewOrder, Order, OrderId, OrderReference, OrderStatusType, Redemption},
    helpers::RewardsConfig,
    traits::{
        BookingDatabase,
        BookingError,
        CustomerDetails,
        OrderQueryFilter,
        Pagination,
        PaymentGatewayClient,
        PaymentLinkRequest,
        TransitionOutcome,
    },
};

pub const DEFAULT_LINK_EXPIRY_MINUTES: i64 = 60;

/// `OrderFlowApi` is the primary API for booking workshops. It places orders, hands out gateway payment links and
/// answers order queries from the booking pages.
pub struct OrderFlowApi<B, G> {
    db: B,
    gateway: Arc<G>,
    rewards: RewardsApi<B>,
    link_expiry_minutes: i64,
}

impl<B, G> Debug for OrderFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi (link expiry {} min)", self.link_expiry_minutes)
    }
}

impl<B: Clone, G> OrderFlowApi<B, G> {
    pub fn new(db: B, gateway: Arc<G>, rewards_config: RewardsConfig) -> Self {
        let rewards = RewardsApi::new(db.clone(), rewards_config);
        Self { db, gateway, rewards, link_expiry_minutes: DEFAULT_LINK_EXPIRY_MINUTES }
    }

    pub fn with_link_expiry_minutes(mut self, minutes: i64) -> Self {
        self.link_expiry_minutes = minutes.max(1);
        self
    }

    pub fn rewards(&self) -> &RewardsApi<B> {
        &self.rewards
    }
}

impl<B, G> OrderFlowApi<B, G>
where
    B: BookingDatabase,
    G: PaymentGatewayClient,
{
    /// Stores a new order in the `created` state. No payment link is issued.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, BookingError> {
        let order = self.db.insert_order(order).await?;
        info!("🔄️📦️ Order {} created for {} ({})", order.order_id, order.user_id, order.amount);
        Ok(order)
    }

    /// The user's open order for the workshop, if there is one.
    ///
    /// An open order whose payment link has lapsed is expired on the spot (and its reservation released), and `None`
    /// is returned.
    pub async fn get_active_order(&self, user_id: &str, workshop_id: &str) -> Result<Option<Order>, BookingError> {
        let Some(order) = self.db.fetch_latest_open_order(user_id, workshop_id).await? else {
            return Ok(None);
        };
        if !order.link_has_lapsed(Utc::now()) {
            return Ok(Some(order));
        }
        debug!("🔄️🕰️ Active order {} for {user_id} has a lapsed payment link", order.order_id);
        let outcome = self.transition_order(&order.order_id, OrderStatusType::Expired).await?;
        match outcome.status() {
            OrderStatusType::Created => Ok(Some(outcome.into_order())),
            _ => Ok(None),
        }
    }

    pub async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, BookingError> {
        self.db.fetch_order(order_id).await
    }

    /// Fetches an order on behalf of a user. Another user's order is reported as not found.
    pub async fn get_order_for_user(&self, user_id: &str, order_id: &OrderId) -> Result<Option<Order>, BookingError> {
        let order = self.db.fetch_order(order_id).await?;
        Ok(order.filter(|o| o.user_id == user_id))
    }

    pub async fn list_orders(
        &self,
        user_id: &str,
        status: Option<OrderStatusType>,
        pagination: Pagination,
    ) -> Result<Vec<Order>, BookingError> {
        let mut query = OrderQueryFilter::default().with_user_id(user_id).with_pagination(pagination);
        if let Some(status) = status {
            query = query.with_status(status);
        }
        self.db.search_orders(query).await
    }

    /// Requests a status change and brings the order's points reservation in line with the result.
    ///
    /// Terminal orders are never changed. The reservation follows the stored status, not the requested one.
    pub async fn transition_order(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
    ) -> Result<TransitionOutcome, BookingError> {
        let outcome = self.db.transition_order(order_id, status).await?;
        if outcome.is_applied() {
            info!("🔄️ Order {order_id} moved to {status}");
        } else {
            debug!("🔄️ Order {order_id} is {} and was not moved to {status}", outcome.status());
        }
        self.rewards.settle_reservation_for(outcome.order()).await?;
        Ok(outcome)
    }

    /// Places a booking.
    ///
    /// 1. If the user already has an open order for the same workshops, amount and redemption, with a usable
    ///    payment link, that order is returned.
    /// 2. Otherwise, any open orders for the requested workshops are cancelled and the new order is created in the
    ///    same transaction. Any requested points are reserved against it.
    /// 3. A payment link for the amount due is requested from the gateway. If that fails, the order is marked failed
    ///    and the gateway error is returned.
    pub async fn place_order(&self, request: BookingRequest) -> Result<Order, BookingError> {
        let mut new_order = NewOrder::new(&request.user_id, request.workshop_ids.clone(), request.amount)?;
        if let Some(bundle_id) = request.bundle_id.clone() {
            new_order = new_order.with_bundle_id(bundle_id);
        }
        let existing = self.open_orders_for(&request.user_id, &new_order.workshop_ids).await?;
        let now = Utc::now();
        if let Some(order) = existing.iter().find(|o| request.can_reuse(o, now)) {
            info!("🔄️📦️ Reusing open order {} for {}", order.order_id, request.user_id);
            return Ok(order.clone());
        }
        let points = request.effective_points();
        if let Some(points) = points {
            let released = existing.iter().filter_map(|o| o.points_redeemed).fold(Points::default(), |a, p| a + p);
            self.rewards.validate_redemption_after_release(&request.user_id, request.amount, points, released).await?;
        }
        let (order, superseded) = self.db.replace_open_orders(new_order).await?;
        info!("🔄️📦️ Order {} created for {} ({})", order.order_id, order.user_id, order.amount);
        for old in superseded {
            self.release_superseded(old).await?;
        }
        self.remember_customer(&order.order_id, &request.customer).await;
        let order = match points {
            Some(points) => match self.apply_points(&order, points).await {
                Ok((order, _)) => order,
                Err(e) => {
                    warn!("🔄️📦️ Could not apply {points} to order {}. {e}", order.order_id);
                    self.mark_failed(&order.order_id).await;
                    return Err(e);
                },
            },
            None => order,
        };
        self.issue_link(order, &request.customer, request.description.clone()).await
    }

    /// Spends reward points on one of the user's open orders.
    ///
    /// The points are reserved and the order's amount due is reduced. If the order already has a payment link, it is
    /// cancelled and a new link for the reduced amount is issued to the same customer.
    pub async fn redeem_points(
        &self,
        user_id: &str,
        order_id: &OrderId,
        points: Points,
    ) -> Result<RedeemedOrder, BookingError> {
        let order = self
            .get_order_for_user(user_id, order_id)
            .await?
            .ok_or_else(|| BookingError::OrderNotFound(order_id.clone()))?;
        if order.status != OrderStatusType::Created {
            return Err(BookingError::OrderNotOpen(order_id.clone(), order.status.to_string()));
        }
        let previous_link = order.payment_link_id.clone();
        let customer = customer_of(&order);
        let (order, redemption) = match self.apply_points(&order, points).await {
            Ok(applied) => applied,
            Err(e) => {
                self.settle_after_failed_redemption(order_id).await;
                return Err(e);
            },
        };
        let Some(link_id) = previous_link else {
            return Ok(RedeemedOrder::new(&redemption, order));
        };
        if let Err(e) = self.gateway.cancel_link(&link_id).await {
            warn!("🔄️📦️ Could not cancel payment link {link_id} for order {}. {e}", order.order_id);
        }
        let order = self.issue_link(order, &customer, None).await?;
        Ok(RedeemedOrder::new(&redemption, order))
    }

    /// Requests a payment link for the order's amount due and attaches it to the order. If the gateway fails, the
    /// order is marked failed and the gateway error is returned. If the order was closed in the meantime, the new
    /// link is cancelled again.
    async fn issue_link(
        &self,
        order: Order,
        customer: &CustomerDetails,
        description: Option<String>,
    ) -> Result<Order, BookingError> {
        let link_request = PaymentLinkRequest {
            order_id: order.order_id.clone(),
            reference_id: match &order.bundle_id {
                Some(bundle_id) => OrderReference::for_bundle(bundle_id),
                None => order.order_id.to_string(),
            },
            amount: order.payable_amount(),
            currency: order.currency.clone(),
            customer: customer.clone(),
            description: description.unwrap_or_else(|| format!("Workshop booking {}", order.order_id)),
            expire_in_minutes: self.link_expiry_minutes,
        };
        match self.gateway.create_link(link_request).await {
            Ok(link) => {
                let order = self.db.attach_payment_link(&order.order_id, &link).await?;
                if order.status != OrderStatusType::Created {
                    let (order_id, link_id) = (&order.order_id, &link.link_id);
                    warn!("🔄️📦️ Order {order_id} became {} while link {link_id} was issued", order.status);
                    if let Err(e) = self.gateway.cancel_link(link_id).await {
                        warn!("🔄️📦️ Could not cancel payment link {link_id} for order {order_id}. {e}");
                    }
                    return Ok(order);
                }
                info!("🔄️📦️ Payment link {} issued for order {}", link.link_id, order.order_id);
                Ok(order)
            },
            Err(e) => {
                error!("🔄️📦️ Payment gateway could not issue a link for order {}. {e}", order.order_id);
                self.mark_failed(&order.order_id).await;
                Err(e.into())
            },
        }
    }

    async fn open_orders_for(&self, user_id: &str, workshop_ids: &[String]) -> Result<Vec<Order>, BookingError> {
        let mut orders: Vec<Order> = Vec::new();
        for workshop_id in workshop_ids {
            if let Some(order) = self.get_active_order(user_id, workshop_id).await? {
                if !orders.iter().any(|o| o.order_id == order.order_id) {
                    orders.push(order);
                }
            }
        }
        Ok(orders)
    }

    /// Releases the reservation and the payment link of an open order that a new booking replaced.
    async fn release_superseded(&self, order: Order) -> Result<(), BookingError> {
        info!("🔄️📦️ Order {} superseded by a new booking", order.order_id);
        self.rewards.settle_reservation_for(&order).await?;
        if let Some(link_id) = order.payment_link_id.as_deref() {
            if let Err(e) = self.gateway.cancel_link(link_id).await {
                warn!("🔄️📦️ Could not cancel payment link {link_id} for order {}. {e}", order.order_id);
            }
        }
        Ok(())
    }

    /// Keeps the customer's contact details with the order, so that a reissued link reaches the same customer.
    async fn remember_customer(&self, order_id: &OrderId, customer: &CustomerDetails) {
        if *customer == CustomerDetails::default() {
            return;
        }
        if let Err(e) = self.db.merge_gateway_metadata(order_id, json!({ "customer": customer })).await {
            warn!("🔄️📦️ Could not store customer details for order {order_id}. {e}");
        }
    }

    async fn apply_points(&self, order: &Order, points: Points) -> Result<(Order, Redemption), BookingError> {
        let workshop_id = order.workshop_ids.first().cloned().unwrap_or_default();
        let redemption =
            self.rewards.redeem(&order.user_id, &order.order_id, &workshop_id, points, order.amount).await?;
        let order =
            self.db.apply_points_to_order(&order.order_id, redemption.points_reserved, redemption.final_amount).await?;
        Ok((order, redemption))
    }

    /// The order may have closed between reserving the points and applying them. Settle the reservation against
    /// whatever the order's status is now.
    async fn settle_after_failed_redemption(&self, order_id: &OrderId) {
        let settled = match self.db.fetch_order(order_id).await {
            Ok(Some(order)) => self.rewards.settle_reservation_for(&order).await.map(|_| ()),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = settled {
            error!("🔄️📦️ Could not settle the reservation for order {order_id}. {e}");
        }
    }

    async fn mark_failed(&self, order_id: &OrderId) {
        if let Err(e) = self.transition_order(order_id, OrderStatusType::Failed).await {
            error!("🔄️📦️ Could not mark order {order_id} as failed. {e}");
        }
    }
}

/// The customer details stored with the order, or empty details if there are none.
fn customer_of(order: &Order) -> CustomerDetails {
    order
        .gateway_metadata
        .get("customer")
        .and_then(|c| serde_json::from_value(c.clone()).ok())
        .unwrap_or_default()
}
