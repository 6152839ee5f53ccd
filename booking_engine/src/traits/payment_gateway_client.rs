use serde::{Deserialize, Serialize};
use thiserror::Error;
use wb_common::Paise;

use crate::db_types::{OrderId, PaymentLink};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLinkRequest {
    pub order_id: OrderId,
    /// The id the gateway echoes back in its callbacks. Either the order id, or a bundle reference.
    pub reference_id: String,
    pub amount: Paise,
    pub currency: String,
    pub customer: CustomerDetails,
    pub description: String,
    pub expire_in_minutes: i64,
}

/// The hosted payment-link capability of a payment gateway.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayClient {
    async fn create_link(&self, request: PaymentLinkRequest) -> Result<PaymentLink, GatewayClientError>;

    async fn cancel_link(&self, link_id: &str) -> Result<(), GatewayClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayClientError {
    #[error("Could not reach the payment gateway: {0}")]
    Network(String),
    #[error("The payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Unexpected response from the payment gateway: {0}")]
    InvalidResponse(String),
    #[error("The payment gateway is not configured")]
    NotConfigured,
}
