use sqlx::{types::Json, SqliteConnection};

use crate::db_types::{GatewayCallback, WebhookEvent, WebhookOutcome};

pub async fn insert_event(
    callback: &GatewayCallback,
    conn: &mut SqliteConnection,
) -> Result<WebhookEvent, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO webhook_events
                (payment_id, payment_link_id, reference_id, gateway_status, signature, raw_request)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(callback.payment_id.as_deref())
    .bind(callback.payment_link_id.as_deref())
    .bind(callback.payment_link_reference_id.as_deref())
    .bind(callback.payment_link_status.as_deref())
    .bind(callback.signature.as_deref())
    .bind(Json(&callback.raw))
    .fetch_one(conn)
    .await
}

pub async fn finalise_event(
    id: i64,
    outcome: &WebhookOutcome,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE webhook_events SET processed = $1, order_updated = $2, processing_error = $3, processed_at = \
         CURRENT_TIMESTAMP WHERE id = $4",
    )
    .bind(outcome.processed)
    .bind(outcome.order_updated)
    .bind(outcome.error.as_deref())
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_event(id: i64, conn: &mut SqliteConnection) -> Result<Option<WebhookEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM webhook_events WHERE id = $1").bind(id).fetch_optional(conn).await
}
