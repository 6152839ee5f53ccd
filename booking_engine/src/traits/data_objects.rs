use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, OrderStatusType, Redemption};

/// The result of asking the store to move an order out of `created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransitionOutcome {
    /// The status was changed. Contains the updated order.
    Applied(Order),
    /// The order was already terminal (or already in the requested state). Contains the order as stored.
    Unchanged(Order),
}

impl TransitionOutcome {
    pub fn order(&self) -> &Order {
        match self {
            Self::Applied(o) | Self::Unchanged(o) => o,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            Self::Applied(o) | Self::Unchanged(o) => o,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The order's status after the request, whether or not the request changed it.
    pub fn status(&self) -> OrderStatusType {
        self.order().status
    }
}

/// Result of an idempotent ledger insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordOutcome {
    Inserted(i64),
    AlreadyExists(i64),
}

impl RecordOutcome {
    pub fn id(&self) -> i64 {
        match self {
            Self::Inserted(id) | Self::AlreadyExists(id) => *id,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Result of completing or cancelling a redemption reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationOutcome {
    Resolved(Redemption),
    NoPendingReservation,
}

impl ReservationOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub count: u32,
}

impl Pagination {
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn new(page: u32, count: u32) -> Self {
        Self { page: page.max(1), count: count.clamp(1, Self::MAX_PAGE_SIZE) }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.count)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.count)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub user_id: Option<String>,
    pub workshop_id: Option<String>,
    pub bundle_id: Option<String>,
    pub statuses: Vec<OrderStatusType>,
    pub pagination: Option<Pagination>,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_workshop_id(mut self, workshop_id: &str) -> Self {
        self.workshop_id = Some(workshop_id.to_string());
        self
    }

    pub fn with_bundle_id(mut self, bundle_id: &str) -> Self {
        self.bundle_id = Some(bundle_id.to_string());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.user_id.is_none() &&
            self.workshop_id.is_none() &&
            self.bundle_id.is_none() &&
            self.statuses.is_empty()
    }
}
