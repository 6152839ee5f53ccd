use std::fmt::Display;

use booking_engine::{
    db_types::{GatewayCallback, OrderId, OrderStatusType, WebhookOutcome},
    order_objects::BookingRequest,
    traits::{CustomerDetails, Pagination},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wb_common::{Paise, Points};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//----------------------------------------------   Orders  ----------------------------------------------------

/// Body of `POST /api/orders`. Amounts are in paise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub workshop_ids: Vec<String>,
    pub amount: Paise,
    #[serde(default)]
    pub points_to_redeem: Option<Points>,
    #[serde(default)]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub customer: Option<CustomerDetails>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PlaceOrderRequest {
    pub fn into_booking(self, user_id: &str) -> BookingRequest {
        let mut booking = BookingRequest::new(user_id, self.workshop_ids, self.amount);
        if let Some(points) = self.points_to_redeem {
            booking = booking.with_points(points);
        }
        if let Some(customer) = self.customer {
            booking = booking.with_customer(customer);
        }
        if let Some(bundle_id) = self.bundle_id.as_deref() {
            booking = booking.with_bundle_id(bundle_id);
        }
        booking.description = self.description;
        booking
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub count: Option<u32>,
}

impl From<&PageParams> for Pagination {
    fn from(p: &PageParams) -> Self {
        let default = Pagination::default();
        Pagination::new(p.page.unwrap_or(default.page), p.count.unwrap_or(default.count))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderListParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub count: Option<u32>,
}

impl OrderListParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::from(&PageParams { page: self.page, count: self.count })
    }

    pub fn status(&self) -> Result<Option<OrderStatusType>, ServerError> {
        self.status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_lowercase().parse::<OrderStatusType>())
            .transpose()
            .map_err(|e| ServerError::InvalidRequest(format!("Unknown order status. {e}")))
    }
}

//----------------------------------------------   Rewards  ----------------------------------------------------

/// Query of `GET /api/rewards/calculate`. The amount is in paise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateParams {
    pub amount: Paise,
}

/// Body of `POST /api/rewards/redeem`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemRequest {
    pub order_id: OrderId,
    pub points: Points,
}

//----------------------------------------------   Callbacks  ----------------------------------------------------

/// The gateway prefixes its callback parameters with `razorpay_` when it redirects the customer, but not in its
/// server-to-server notifications. Both spellings are accepted.
const CALLBACK_PREFIX: &str = "razorpay_";

/// Builds a gateway callback from the parameters of a callback request, whichever way they arrived. The parameters
/// are kept verbatim as the raw snapshot.
pub fn callback_from_params(params: Map<String, Value>) -> GatewayCallback {
    let field = |name: &str| {
        [name.to_string(), format!("{CALLBACK_PREFIX}{name}")]
            .iter()
            .filter_map(|key| params.get(key))
            .find_map(value_as_string)
    };
    GatewayCallback {
        payment_id: field("payment_id"),
        payment_link_id: field("payment_link_id"),
        payment_link_reference_id: field("payment_link_reference_id"),
        payment_link_status: field("payment_link_status"),
        signature: field("signature"),
        raw: Value::Object(params.clone()),
    }
}

fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// What the callback route tells the gateway. The gateway only cares that the callback was received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackAck {
    pub status: String,
    pub event_id: Option<i64>,
    pub processed: bool,
    pub order_updated: bool,
}

impl CallbackAck {
    pub fn new(event_id: i64, outcome: &WebhookOutcome) -> Self {
        Self {
            status: "ok".to_string(),
            event_id: Some(event_id),
            processed: outcome.processed,
            order_updated: outcome.order_updated,
        }
    }

    /// The callback could not even be audited.
    pub fn unrecorded() -> Self {
        Self { status: "ok".to_string(), event_id: None, processed: false, order_updated: false }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn prefixed_and_bare_names_are_accepted() {
        let cb = callback_from_params(params(json!({
            "razorpay_payment_id": "pay_1",
            "razorpay_payment_link_id": "plink_1",
            "razorpay_payment_link_reference_id": "ord_1",
            "razorpay_payment_link_status": "paid",
            "razorpay_signature": "abc",
        })));
        assert_eq!(cb.payment_id.as_deref(), Some("pay_1"));
        assert_eq!(cb.payment_link_status.as_deref(), Some("paid"));
        assert_eq!(cb.raw["razorpay_signature"], "abc");

        let cb = callback_from_params(params(json!({
            "payment_link_reference_id": "BUNDLE_7",
            "payment_link_status": "paid",
        })));
        assert_eq!(cb.payment_link_reference_id.as_deref(), Some("BUNDLE_7"));
        assert!(cb.payment_id.is_none());
    }

    #[test]
    fn blank_values_count_as_missing() {
        let cb = callback_from_params(params(json!({ "payment_link_reference_id": "  ", "payment_link_status": 3 })));
        assert!(cb.payment_link_reference_id.is_none());
        assert_eq!(cb.payment_link_status.as_deref(), Some("3"));
    }

    #[test]
    fn order_list_status_filter() {
        let p = OrderListParams { status: Some("Paid".into()), ..Default::default() };
        assert_eq!(p.status().unwrap(), Some(OrderStatusType::Paid));
        let p = OrderListParams { status: Some("refunded".into()), ..Default::default() };
        assert!(p.status().is_err());
        assert_eq!(OrderListParams::default().status().unwrap(), None);
    }
}
