use serde::{Deserialize, Serialize};
use wb_common::{Paise, Points};

/// How many points a user may spend on a booking of a given amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionQuote {
    /// Points the user can spend right now: the available balance less any pending reservations.
    pub available_points: Points,
    pub max_points: Points,
    pub max_discount: Paise,
    pub recommended_points: Points,
    pub exchange_rate: Paise,
}

/// A redemption that has passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRedemption {
    pub points: Points,
    pub discount: Paise,
    pub original_amount: Paise,
    pub final_amount: Paise,
}
