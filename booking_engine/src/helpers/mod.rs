mod rewards_math;

pub use rewards_math::{
    cashback_points,
    max_redeemable_points,
    percentage_cap_points,
    workshop_cap_points,
    RewardsConfig,
};
