//! HTTP adapter for the gateway's hosted payment-link API.
use std::sync::Arc;

use booking_engine::{
    db_types::PaymentLink,
    traits::{GatewayClientError, PaymentGatewayClient, PaymentLinkRequest},
};
use chrono::{DateTime, Duration, Utc};
use log::*;
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::GatewayConfig;

#[derive(Clone)]
pub struct PaymentLinkClient {
    config: GatewayConfig,
    client: Arc<Client>,
}

#[derive(Debug, Clone, Deserialize)]
struct PaymentLinkResponse {
    id: String,
    short_url: String,
    #[serde(default)]
    expire_by: Option<i64>,
}

impl PaymentLinkClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayClientError> {
        let client = Client::builder().build().map_err(|e| GatewayClientError::Network(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, GatewayClientError> {
        if !self.config.is_configured() {
            return Err(GatewayClientError::NotConfigured);
        }
        let url = self.url(path);
        trace!("💳️ Sending gateway request: {method} {url}");
        let mut req = self
            .client
            .request(method, url)
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.reveal()));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| GatewayClientError::Network(e.to_string()))?;
        if response.status().is_success() {
            trace!("💳️ Gateway request successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayClientError::InvalidResponse(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayClientError::Network(e.to_string()))?;
            Err(GatewayClientError::Rejected { status, message })
        }
    }

    fn link_body(&self, request: &PaymentLinkRequest) -> Value {
        let expire_by = Utc::now() + Duration::minutes(request.expire_in_minutes);
        let mut body = json!({
            "amount": request.amount.value(),
            "currency": request.currency,
            "accept_partial": false,
            "expire_by": expire_by.timestamp(),
            "reference_id": request.reference_id,
            "description": request.description,
            "customer": {
                "name": request.customer.name,
                "email": request.customer.email,
                "contact": request.customer.phone,
            },
            "notify": { "sms": self.config.notify_customer, "email": self.config.notify_customer },
            "reminder_enable": false,
            "notes": { "order_id": request.order_id.as_str() },
        });
        if let Some(callback_url) = &self.config.callback_url {
            body["callback_url"] = json!(callback_url);
            body["callback_method"] = json!("get");
        }
        body
    }
}

impl PaymentGatewayClient for PaymentLinkClient {
    async fn create_link(&self, request: PaymentLinkRequest) -> Result<PaymentLink, GatewayClientError> {
        let body = self.link_body(&request);
        debug!("💳️ Requesting a payment link of {} for order {}", request.amount, request.order_id);
        let raw = self.rest_query::<Value, Value>(Method::POST, "/payment_links", Some(body)).await?;
        let link = serde_json::from_value::<PaymentLinkResponse>(raw.clone())
            .map_err(|e| GatewayClientError::InvalidResponse(e.to_string()))?;
        let expire_at = link.expire_by.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));
        info!("💳️ Payment link {} created for order {}", link.id, request.order_id);
        Ok(PaymentLink { link_id: link.id, url: link.short_url, expire_at, raw })
    }

    async fn cancel_link(&self, link_id: &str) -> Result<(), GatewayClientError> {
        let path = format!("/payment_links/{link_id}/cancel");
        debug!("💳️ Cancelling payment link {link_id}");
        let _ = self.rest_query::<Value, ()>(Method::POST, &path, None).await?;
        info!("💳️ Payment link {link_id} cancelled");
        Ok(())
    }
}
