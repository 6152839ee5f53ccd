use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wb_common::{Paise, Points};

use crate::{
    db_types::{Order, Redemption},
    traits::CustomerDetails,
};

/// Everything the booking flow needs to place (or reuse) an order for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub user_id: String,
    pub workshop_ids: Vec<String>,
    pub amount: Paise,
    #[serde(default)]
    pub points_to_redeem: Option<Points>,
    #[serde(default)]
    pub customer: CustomerDetails,
    #[serde(default)]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl BookingRequest {
    pub fn new(user_id: &str, workshop_ids: Vec<String>, amount: Paise) -> Self {
        Self {
            user_id: user_id.to_string(),
            workshop_ids,
            amount,
            points_to_redeem: None,
            customer: CustomerDetails::default(),
            bundle_id: None,
            description: None,
        }
    }

    pub fn with_points(mut self, points: Points) -> Self {
        self.points_to_redeem = Some(points);
        self
    }

    pub fn with_customer(mut self, customer: CustomerDetails) -> Self {
        self.customer = customer;
        self
    }

    pub fn with_bundle_id(mut self, bundle_id: &str) -> Self {
        self.bundle_id = Some(bundle_id.to_string());
        self
    }

    /// The points that will actually be redeemed. Zero or negative requests mean "no redemption".
    pub fn effective_points(&self) -> Option<Points> {
        self.points_to_redeem.filter(|p| p.is_positive())
    }

    /// An existing open order can be handed back instead of creating a new one if it is for the same workshops, the
    /// same amount and the same redemption, and its payment link is still usable.
    pub fn can_reuse(&self, order: &Order, now: DateTime<Utc>) -> bool {
        let requested = self.workshop_ids.iter().map(|w| w.trim()).filter(|w| !w.is_empty()).collect::<BTreeSet<_>>();
        let existing = order.workshop_ids.iter().map(String::as_str).collect::<BTreeSet<_>>();
        let points = self.effective_points().unwrap_or_default();
        requested == existing &&
            order.amount == self.amount &&
            order.points_redeemed.unwrap_or_default() == points &&
            order.payment_link_url.is_some() &&
            !order.link_has_lapsed(now)
    }
}

/// The result of spending points on an open order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemedOrder {
    /// Id of the pending reservation holding the points.
    pub redemption_id: i64,
    /// The order, with its discounted amount and reissued payment link.
    pub order: Order,
}

impl RedeemedOrder {
    pub fn new(redemption: &Redemption, order: Order) -> Self {
        Self { redemption_id: redemption.id, order }
    }
}
