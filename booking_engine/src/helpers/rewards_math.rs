//! Reward point arithmetic.
//!
//! All amounts are integers: currency in paise, rewards in whole points, and the exchange rate in paise per point.
//! Nothing here touches the database, so the booking flow, the rewards API and the cashback generator all share the
//! same numbers.
use serde::{Deserialize, Serialize};
use wb_common::{Paise, Points};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsConfig {
    /// Percentage of the amount paid that is returned as cashback.
    pub cashback_percentage: i64,
    /// Maximum share of an order's amount that may be paid with points, as a percentage.
    pub redemption_cap_percentage: i64,
    /// Absolute ceiling on the discount for a single workshop booking.
    pub redemption_cap_per_workshop: Paise,
    /// Value of one point, in paise.
    pub exchange_rate: Paise,
    /// Points credited when a wallet is first created. Zero disables the bonus.
    pub welcome_bonus: Points,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            cashback_percentage: 10,
            redemption_cap_percentage: 10,
            redemption_cap_per_workshop: Paise::from_rupees(500),
            exchange_rate: Paise::from(100),
            welcome_bonus: Points::from(0),
        }
    }
}

impl RewardsConfig {
    pub fn cashback_for(&self, paid: Paise) -> Points {
        cashback_points(paid, self.cashback_percentage, self.exchange_rate)
    }

    pub fn max_redeemable_for(&self, available: Points, amount: Paise) -> Points {
        max_redeemable_points(
            available,
            amount,
            self.redemption_cap_percentage,
            self.redemption_cap_per_workshop,
            self.exchange_rate,
        )
    }
}

/// `round_half_up(paid * percentage / 100 / rate)`. Non-positive inputs yield zero points.
pub fn cashback_points(paid: Paise, percentage: i64, rate: Paise) -> Points {
    if !paid.is_positive() || percentage <= 0 || !rate.is_positive() {
        return Points::from(0);
    }
    let numerator = i128::from(paid.value()) * i128::from(percentage);
    let denominator = 100 * i128::from(rate.value());
    let points = (2 * numerator + denominator) / (2 * denominator);
    Points::from(clamp_to_i64(points))
}

/// `floor(amount * percentage / 100 / rate)`
pub fn percentage_cap_points(amount: Paise, percentage: i64, rate: Paise) -> Points {
    if !amount.is_positive() || percentage <= 0 || !rate.is_positive() {
        return Points::from(0);
    }
    let numerator = i128::from(amount.value()) * i128::from(percentage);
    let denominator = 100 * i128::from(rate.value());
    Points::from(clamp_to_i64(numerator / denominator))
}

/// `floor(cap / rate)`
pub fn workshop_cap_points(cap: Paise, rate: Paise) -> Points {
    if !cap.is_positive() || !rate.is_positive() {
        return Points::from(0);
    }
    Points::from(cap.value() / rate.value())
}

/// The most points that may be spent on a booking of `amount`. This is the smallest of the available balance, the
/// percentage cap and the per-workshop cap.
pub fn max_redeemable_points(available: Points, amount: Paise, cap_percentage: i64, cap: Paise, rate: Paise) -> Points {
    let available = available.max(Points::from(0));
    available.min(percentage_cap_points(amount, cap_percentage, rate)).min(workshop_cap_points(cap, rate))
}

fn clamp_to_i64(v: i128) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
