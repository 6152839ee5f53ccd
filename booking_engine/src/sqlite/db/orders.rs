use chrono::{DateTime, Utc};
use log::{debug, trace};
use serde_json::Value;
use sqlx::{types::Json, QueryBuilder, SqliteConnection};
use wb_common::{Paise, Points};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, PaymentLink},
    traits::{OrderQueryFilter, TransitionOutcome},
};

/// Inserts a new order into the database using the given connection. The order always starts out `created`.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (order_id, user_id, workshop_ids, amount, currency, bundle_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.user_id)
    .bind(Json(order.workshop_ids))
    .bind(order.amount)
    .bind(order.currency)
    .bind(order.bundle_id)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order {} saved with id {}", order.order_id, order.id);
    Ok(order)
}

/// Cancels every `created` order the user has for any of `workshop_ids`, returning the cancelled orders.
pub async fn cancel_open_orders_for(
    user_id: &str,
    workshop_ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let cancelled: Vec<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET status = 'cancelled', updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $1 AND status = 'created'
              AND EXISTS (
                SELECT 1 FROM json_each(orders.workshop_ids)
                WHERE json_each.value IN (SELECT value FROM json_each($2))
              )
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(Json(workshop_ids))
    .fetch_all(conn)
    .await?;
    for order in &cancelled {
        debug!("🗃️ Open order {} for {user_id} cancelled", order.order_id);
    }
    Ok(cancelled)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await
}

/// Most recent `created` order for the user that lists `workshop_id` among its workshops.
pub async fn fetch_latest_open_order(
    user_id: &str,
    workshop_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE user_id = $1 AND status = 'created'
              AND EXISTS (SELECT 1 FROM json_each(orders.workshop_ids) WHERE json_each.value = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT 1;
        "#,
    )
    .bind(user_id)
    .bind(workshop_id)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_orders_for_bundle(bundle_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE bundle_id = $1 ORDER BY id").bind(bundle_id).fetch_all(conn).await
}

pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.to_string());
    }
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(workshop_id) = query.workshop_id {
        where_clause.push("EXISTS (SELECT 1 FROM json_each(orders.workshop_ids) WHERE json_each.value = ");
        where_clause.push_bind_unseparated(workshop_id);
        where_clause.push_unseparated(")");
    }
    if let Some(bundle_id) = query.bundle_id {
        where_clause.push("bundle_id = ");
        where_clause.push_bind_unseparated(bundle_id);
    }
    if !query.statuses.is_empty() {
        let statuses = query.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    if let Some(page) = query.pagination {
        builder.push(" LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {}", orders.len());
    Ok(orders)
}

/// Moves the order to `status` if, and only if, it is currently `created`. Returns `None` if the order does not exist.
///
/// Requesting `created` never changes anything.
pub async fn transition_order(
    order_id: &OrderId,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<TransitionOutcome>, sqlx::Error> {
    if status.is_terminal() {
        let updated: Option<Order> = sqlx::query_as(
            "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND status = 'created' \
             RETURNING *",
        )
        .bind(status)
        .bind(order_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
        if let Some(order) = updated {
            debug!("🗃️ Order {order_id} is now {status}");
            return Ok(Some(TransitionOutcome::Applied(order)));
        }
    }
    let current = fetch_order_by_order_id(order_id, conn).await?;
    if let Some(order) = &current {
        trace!("🗃️ Order {order_id} left as {} (requested {status})", order.status);
    }
    Ok(current.map(TransitionOutcome::Unchanged))
}

/// Merges the JSON object `fields` into the order's gateway metadata. Returns false if the order does not exist.
pub async fn merge_gateway_metadata(
    order_id: &OrderId,
    fields: &Value,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET gateway_metadata = json_patch(gateway_metadata, $1), updated_at = CURRENT_TIMESTAMP WHERE \
         order_id = $2",
    )
    .bind(fields.to_string())
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn attach_payment_link(
    order_id: &OrderId,
    link: &PaymentLink,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET
                payment_link_id = $1,
                payment_link_url = $2,
                payment_link_expire_at = $3,
                gateway_metadata = json_set(gateway_metadata, '$.payment_link', json($4)),
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $5
            RETURNING *;
        "#,
    )
    .bind(link.link_id.as_str())
    .bind(link.url.as_str())
    .bind(link.expire_at)
    .bind(link.raw.to_string())
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await
}

/// Records the points applied to an open order. Returns `None` if the order doesn't exist or is no longer `created`.
pub async fn apply_points_to_order(
    order_id: &OrderId,
    points: Points,
    final_amount: Paise,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE orders SET points_redeemed = $1, final_amount_paid = $2, updated_at = CURRENT_TIMESTAMP WHERE order_id \
         = $3 AND status = 'created' RETURNING *",
    )
    .bind(points)
    .bind(final_amount)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await
}

pub async fn fetch_lapsed_orders(
    now: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status = 'created'
              AND payment_link_expire_at IS NOT NULL
              AND julianday(payment_link_expire_at) < julianday($1)
            ORDER BY julianday(payment_link_expire_at) ASC, id ASC
            LIMIT $2;
        "#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(conn)
    .await
}

pub async fn fetch_unrewarded_paid_orders(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM orders WHERE status = 'paid' AND rewards_generated = FALSE ORDER BY updated_at ASC, id ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(conn)
    .await
}

pub async fn mark_rewards_generated(
    order_id: &OrderId,
    cashback: Points,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET rewards_generated = TRUE, cashback_amount = $1, updated_at = CURRENT_TIMESTAMP WHERE \
         order_id = $2 AND rewards_generated = FALSE",
    )
    .bind(cashback)
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
