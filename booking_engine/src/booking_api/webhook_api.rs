use std::fmt::Debug;

use log::*;
use serde_json::{json, Map, Value};

use crate::{
    booking_api::rewards_api::RewardsApi,
    db_types::{GatewayCallback, Order, OrderReference, OrderStatusType, WebhookEvent, WebhookOutcome},
    helpers::RewardsConfig,
    traits::{BookingDatabase, BookingError},
};

pub const MISSING_PARAMETERS: &str = "missing parameters";

/// `WebhookApi` reconciles payment gateway callbacks with our orders.
///
/// Gateways retry, reorder and delay callbacks. Every callback is audited before anything else happens, and applying
/// the same callback twice has the same effect as applying it once.
pub struct WebhookApi<B> {
    db: B,
    rewards: RewardsApi<B>,
}

impl<B> Debug for WebhookApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi")
    }
}

impl<B: Clone> WebhookApi<B> {
    pub fn new(db: B, rewards_config: RewardsConfig) -> Self {
        let rewards = RewardsApi::new(db.clone(), rewards_config);
        Self { db, rewards }
    }
}

impl<B> WebhookApi<B>
where B: BookingDatabase
{
    /// Processes a payment gateway callback.
    ///
    /// An error is only returned if the callback could not be written to the audit log. Every other problem is
    /// recorded against the audit entry and reported in the returned outcome. Either way, the caller should
    /// acknowledge the callback.
    pub async fn process_callback(
        &self,
        callback: GatewayCallback,
    ) -> Result<(WebhookEvent, WebhookOutcome), BookingError> {
        let event = self.db.insert_webhook_event(&callback).await?;
        debug!("🪝️ Callback #{} received for reference {:?}", event.id, callback.payment_link_reference_id);
        let outcome = self.reconcile(&callback, event.id).await;
        if let Some(e) = &outcome.error {
            warn!("🪝️ Callback #{} processed with error: {e}", event.id);
        } else {
            info!("🪝️ Callback #{} processed. Orders updated: {}", event.id, outcome.order_updated);
        }
        if let Err(e) = self.db.finalise_webhook_event(event.id, &outcome).await {
            error!("🪝️ Could not record the outcome of callback #{}. {e}", event.id);
        }
        Ok((event, outcome))
    }

    async fn reconcile(&self, callback: &GatewayCallback, event_id: i64) -> WebhookOutcome {
        let reference = callback.payment_link_reference_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let gateway_status = callback.payment_link_status.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let (Some(reference), Some(gateway_status)) = (reference, gateway_status) else {
            return WebhookOutcome { processed: true, order_updated: false, error: Some(MISSING_PARAMETERS.into()) };
        };
        let status = OrderStatusType::from_gateway_status(gateway_status);
        let orders = match self.resolve_orders(reference).await {
            Ok(orders) if orders.is_empty() => {
                return WebhookOutcome {
                    processed: true,
                    order_updated: false,
                    error: Some(format!("no order found for reference {reference}")),
                };
            },
            Ok(orders) => orders,
            Err(e) => return WebhookOutcome { processed: true, order_updated: false, error: Some(e.to_string()) },
        };
        let metadata = metadata_patch(callback, gateway_status, event_id);
        let mut outcome = WebhookOutcome { processed: true, ..Default::default() };
        for order in orders {
            match self.apply_to_order(&order, status, metadata.clone()).await {
                Ok(changed) => outcome.order_updated |= changed,
                Err(e) => {
                    warn!("🪝️ Could not apply callback #{event_id} to order {}. {e}", order.order_id);
                    outcome.error.get_or_insert_with(|| e.to_string());
                },
            }
        }
        outcome
    }

    async fn resolve_orders(&self, reference: &str) -> Result<Vec<Order>, BookingError> {
        match OrderReference::parse(reference) {
            Some(OrderReference::Bundle(bundle_id)) => self.db.fetch_orders_for_bundle(&bundle_id).await,
            Some(OrderReference::Single(order_id)) => Ok(self.db.fetch_order(&order_id).await?.into_iter().collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Returns true if the order's status was changed.
    async fn apply_to_order(
        &self,
        order: &Order,
        status: OrderStatusType,
        metadata: Value,
    ) -> Result<bool, BookingError> {
        let outcome = self.db.transition_order(&order.order_id, status).await?;
        self.db.merge_gateway_metadata(&order.order_id, metadata).await?;
        if outcome.is_applied() {
            info!("🪝️ Order {} is now {status}", order.order_id);
        } else if outcome.status() != status {
            debug!("🪝️ Order {} stays {} (gateway says {status})", order.order_id, outcome.status());
        }
        self.rewards.settle_reservation_for(outcome.order()).await?;
        Ok(outcome.is_applied())
    }
}

fn metadata_patch(callback: &GatewayCallback, gateway_status: &str, event_id: i64) -> Value {
    let mut fields = Map::new();
    if let Some(payment_id) = callback.payment_id.as_deref().filter(|s| !s.is_empty()) {
        fields.insert("payment_id".into(), json!(payment_id));
    }
    if let Some(link_id) = callback.payment_link_id.as_deref().filter(|s| !s.is_empty()) {
        fields.insert("payment_link_id".into(), json!(link_id));
    }
    fields.insert("payment_link_status".into(), json!(gateway_status));
    fields.insert("last_webhook_event_id".into(), json!(event_id));
    Value::Object(fields)
}
