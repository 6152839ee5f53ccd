use crate::{
    db_types::{GatewayCallback, WebhookEvent, WebhookOutcome},
    traits::BookingError,
};

/// The audit trail of inbound gateway callbacks.
#[allow(async_fn_in_trait)]
pub trait WebhookAudit {
    /// Stores the callback as received. Must be called before any other side effect of the callback.
    async fn insert_webhook_event(&self, callback: &GatewayCallback) -> Result<WebhookEvent, BookingError>;

    /// Records how the callback was processed.
    async fn finalise_webhook_event(&self, id: i64, outcome: &WebhookOutcome) -> Result<(), BookingError>;

    async fn fetch_webhook_event(&self, id: i64) -> Result<Option<WebhookEvent>, BookingError>;
}
