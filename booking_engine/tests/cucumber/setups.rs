use booking_engine::helpers::RewardsConfig;
use cucumber::given;
use wb_common::Points;

use crate::cucumber::{BookingSystem, BookingWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut BookingWorld) {
    world.system = Some(BookingSystem::new(RewardsConfig::default()).await);
}

#[given(expr = "a fresh install with a welcome bonus of {int} points")]
async fn fresh_database_with_bonus(world: &mut BookingWorld, bonus: i64) {
    let config = RewardsConfig { welcome_bonus: Points::from(bonus), ..Default::default() };
    world.system = Some(BookingSystem::new(config).await);
}
