use thiserror::Error;
use wb_common::{Paise, Points};

use crate::{
    db_types::{OrderId, OrderValidationError},
    traits::{GatewayClientError, OrderManagement, RewardsManagement, WebhookAudit},
};

/// The highest level of behaviour a storage backend must provide to run the booking engine.
///
/// Every write in the sub-traits is either a single statement or a single database transaction. Callers never hold
/// a lock across records; concurrent writers are reconciled by conditional updates and idempotent inserts.
#[allow(async_fn_in_trait)]
pub trait BookingDatabase: Clone + OrderManagement + RewardsManagement + WebhookAudit {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), BookingError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum BookingError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Invalid order. {0}")]
    InvalidOrder(#[from] OrderValidationError),
    #[error("{0}")]
    Rewards(#[from] RewardsError),
    #[error("Payment gateway error. {0}")]
    Gateway(#[from] GatewayClientError),
    #[error("Order {0} can no longer be modified because it is {1}")]
    OrderNotOpen(OrderId, String),
}

impl From<sqlx::Error> for BookingError {
    fn from(e: sqlx::Error) -> Self {
        BookingError::DatabaseError(e.to_string())
    }
}

/// Reasons a points redemption is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewardsError {
    #[error("Points to redeem must be positive")]
    NonPositivePoints,
    #[error("Insufficient points. You requested {requested} but only {available} are available")]
    InsufficientPoints { requested: Points, available: Points },
    #[error("Discount cannot exceed {percentage}% of order amount ({max_discount})")]
    ExceedsPercentageCap { percentage: i64, max_discount: Paise },
    #[error("Discount cannot exceed {max_discount} per workshop")]
    ExceedsWorkshopCap { max_discount: Paise },
    #[error("Order {0} already has a points redemption")]
    AlreadyRedeemed(OrderId),
}
