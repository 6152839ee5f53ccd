use booking_engine::{
    db_types::PaymentLink,
    traits::{GatewayClientError, PaymentGatewayClient, PaymentLinkRequest},
};
use chrono::{Duration, Utc};
use mockall::mock;
use serde_json::json;

mock! {
    pub Gateway {}
    impl PaymentGatewayClient for Gateway {
        async fn create_link(&self, request: PaymentLinkRequest) -> Result<PaymentLink, GatewayClientError>;
        async fn cancel_link(&self, link_id: &str) -> Result<(), GatewayClientError>;
    }
}

/// A link like the gateway would return for `request`, valid for the requested window.
pub fn link_for(request: &PaymentLinkRequest) -> PaymentLink {
    let link_id = format!("plink_{}", request.reference_id);
    PaymentLink {
        url: format!("https://rzp.io/i/{link_id}"),
        expire_at: Some(Utc::now() + Duration::minutes(request.expire_in_minutes)),
        raw: json!({ "id": link_id, "amount": request.amount.value(), "status": "created" }),
        link_id,
    }
}

/// A gateway that issues any number of links and accepts any number of cancellations.
pub fn obliging_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_create_link().returning(|req| Ok(link_for(&req)));
    gateway.expect_cancel_link().returning(|_| Ok(()));
    gateway
}
