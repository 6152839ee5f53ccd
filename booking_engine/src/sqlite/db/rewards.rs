//! Reward wallets and the reward ledger.
//!
//! [`record_transaction`] is several statements. Run it inside a transaction (pass `&mut *tx`) so the ledger entry
//! and the wallet increment land together.
use log::{debug, trace, warn};
use sqlx::{types::Json, SqliteConnection};
use wb_common::Points;

use super::is_unique_violation;
use crate::{
    db_types::{NewRewardTransaction, RewardTransaction, RewardWallet, TransactionDirection},
    traits::{Pagination, RecordOutcome},
};

pub async fn fetch_wallet(user_id: &str, conn: &mut SqliteConnection) -> Result<Option<RewardWallet>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM reward_wallets WHERE user_id = $1").bind(user_id).fetch_optional(conn).await
}

/// Inserts an empty wallet unless one exists. Returns the wallet, and whether this call created it.
pub async fn create_wallet_if_absent(
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(RewardWallet, bool), sqlx::Error> {
    let result = sqlx::query("INSERT INTO reward_wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    let created = result.rows_affected() > 0;
    if created {
        debug!("🗃️ Created reward wallet for {user_id}");
    }
    let wallet = sqlx::query_as("SELECT * FROM reward_wallets WHERE user_id = $1").bind(user_id).fetch_one(conn).await?;
    Ok((wallet, created))
}

/// Looks for an existing ledger entry with the same duplicate-suppression key as `tx`. Entries without a reference id
/// have no key and are never duplicates.
pub async fn find_duplicate(
    tx: &NewRewardTransaction,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, sqlx::Error> {
    let Some(reference_id) = tx.reference_id.as_deref() else {
        return Ok(None);
    };
    let id: Option<i64> = if tx.source.dedupes_on_reference_only() {
        sqlx::query_scalar(
            "SELECT id FROM reward_transactions WHERE user_id = $1 AND reference_id = $2 AND source = $3 AND \
             direction = $4 ORDER BY id LIMIT 1",
        )
        .bind(tx.user_id.as_str())
        .bind(reference_id)
        .bind(tx.source)
        .bind(tx.direction)
        .fetch_optional(conn)
        .await?
    } else {
        sqlx::query_scalar(
            "SELECT id FROM reward_transactions WHERE user_id = $1 AND reference_id = $2 AND source = $3 AND \
             direction = $4 AND amount = $5 ORDER BY id LIMIT 1",
        )
        .bind(tx.user_id.as_str())
        .bind(reference_id)
        .bind(tx.source)
        .bind(tx.direction)
        .bind(tx.amount)
        .fetch_optional(conn)
        .await?
    };
    Ok(id)
}

async fn insert_transaction(tx: &NewRewardTransaction, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
            INSERT INTO reward_transactions
                (user_id, direction, amount, source, status, description, reference_id, metadata, processed_at)
            VALUES ($1, $2, $3, $4, 'completed', $5, $6, $7, CURRENT_TIMESTAMP)
            RETURNING id;
        "#,
    )
    .bind(tx.user_id.as_str())
    .bind(tx.direction)
    .bind(tx.amount)
    .bind(tx.source)
    .bind(tx.description.as_str())
    .bind(tx.reference_id.as_deref())
    .bind(Json(&tx.metadata))
    .fetch_one(conn)
    .await
}

/// Applies a ledger entry to the wallet with a single increment statement.
///
/// Credits add to the total, available and lifetime-earned balances. Debits take from the available balance and add
/// to lifetime-redeemed.
pub async fn apply_to_wallet(
    user_id: &str,
    direction: TransactionDirection,
    amount: Points,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    let sql = match direction {
        TransactionDirection::Credit => {
            "UPDATE reward_wallets SET total_balance = total_balance + $1, available_balance = available_balance + $1, \
             lifetime_earned = lifetime_earned + $1, updated_at = CURRENT_TIMESTAMP WHERE user_id = $2"
        },
        TransactionDirection::Debit => {
            "UPDATE reward_wallets SET available_balance = available_balance - $1, lifetime_redeemed = \
             lifetime_redeemed + $1, updated_at = CURRENT_TIMESTAMP WHERE user_id = $2"
        },
    };
    let result = sqlx::query(sql).bind(amount).bind(user_id).execute(conn).await?;
    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Idempotently records a ledger entry and applies it to the wallet, creating the wallet if necessary.
pub async fn record_transaction(
    tx: &NewRewardTransaction,
    conn: &mut SqliteConnection,
) -> Result<RecordOutcome, sqlx::Error> {
    if let Some(id) = find_duplicate(tx, &mut *conn).await? {
        debug!("🗃️ Ledger entry for {} ({} {:?}) already exists as #{id}", tx.user_id, tx.source, tx.reference_id);
        return Ok(RecordOutcome::AlreadyExists(id));
    }
    create_wallet_if_absent(&tx.user_id, &mut *conn).await?;
    let id = match insert_transaction(tx, &mut *conn).await {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            warn!(
                "🗃️ Concurrent write of ledger entry for {} {:?}. Keeping the first one.",
                tx.user_id,
                tx.reference_id
            );
            let existing = find_duplicate(tx, &mut *conn).await?;
            return existing.map(RecordOutcome::AlreadyExists).ok_or(e);
        },
        Err(e) => return Err(e),
    };
    apply_to_wallet(&tx.user_id, tx.direction, tx.amount, conn).await?;
    trace!("🗃️ Ledger entry #{id}: {} {} {} for {}", tx.direction, tx.amount, tx.source, tx.user_id);
    Ok(RecordOutcome::Inserted(id))
}

pub async fn fetch_transactions(
    user_id: &str,
    pagination: Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<RewardTransaction>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM reward_transactions WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(conn)
    .await
}
