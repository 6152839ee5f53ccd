use log::debug;
use sqlx::SqliteConnection;
use wb_common::Points;

use crate::db_types::{NewRedemption, OrderId, Redemption, RedemptionStatus};

/// Inserts a pending reservation, provided the user's available balance less their other pending reservations
/// covers it. An order can only have one reservation; if it already exists it is returned instead, and the flag is
/// false.
///
/// Returns `None` if the balance does not cover the reservation. The balance check and the insert are one statement,
/// so concurrent reservations can never commit more points than the wallet holds.
pub async fn insert_pending(
    redemption: NewRedemption,
    conn: &mut SqliteConnection,
) -> Result<Option<(Redemption, bool)>, sqlx::Error> {
    let inserted: Option<Redemption> = sqlx::query_as(
        r#"
            INSERT INTO reward_redemptions
                (user_id, order_id, workshop_id, points_reserved, discount_amount, original_amount, final_amount)
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE COALESCE((SELECT available_balance FROM reward_wallets WHERE user_id = $1), 0)
                - (SELECT COALESCE(SUM(points_reserved), 0) FROM reward_redemptions
                   WHERE user_id = $1 AND status = 'pending') >= $4
            ON CONFLICT (order_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(redemption.user_id.as_str())
    .bind(redemption.order_id.as_str())
    .bind(redemption.workshop_id.as_str())
    .bind(redemption.points_reserved)
    .bind(redemption.discount_amount)
    .bind(redemption.original_amount)
    .bind(redemption.final_amount)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(r) = inserted {
        debug!("🗃️ Reserved {} for order {}", r.points_reserved, r.order_id);
        return Ok(Some((r, true)));
    }
    match fetch_for_order(&redemption.order_id, conn).await? {
        Some(existing) => {
            debug!("🗃️ Order {} already has a reservation", redemption.order_id);
            Ok(Some((existing, false)))
        },
        None => {
            debug!("🗃️ {} cannot cover a reservation of {}", redemption.user_id, redemption.points_reserved);
            Ok(None)
        },
    }
}

pub async fn fetch_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Redemption>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM reward_redemptions WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await
}

pub async fn pending_points_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Points, sqlx::Error> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(points_reserved), 0) FROM reward_redemptions WHERE user_id = $1 AND status = 'pending'",
    )
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(Points::from(total))
}

/// The user's available balance less their pending reservations, floored at zero.
pub async fn redeemable_points(user_id: &str, conn: &mut SqliteConnection) -> Result<Points, sqlx::Error> {
    let total: i64 = sqlx::query_scalar(
        r#"
            SELECT MAX(0, COALESCE((SELECT available_balance FROM reward_wallets WHERE user_id = $1), 0)
                - (SELECT COALESCE(SUM(points_reserved), 0) FROM reward_redemptions
                   WHERE user_id = $1 AND status = 'pending'));
        "#,
    )
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(Points::from(total))
}

/// Moves the order's reservation out of `pending`. Returns `None` if there is no pending reservation.
pub async fn resolve(
    order_id: &OrderId,
    status: RedemptionStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Redemption>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE reward_redemptions SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND status = \
         'pending' RETURNING *",
    )
    .bind(status)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await
}
