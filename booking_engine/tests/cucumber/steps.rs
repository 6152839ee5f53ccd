use booking_engine::{
    db_types::{NewOrder, NewRewardTransaction, RewardSource},
    order_objects::BookingRequest,
    traits::{OrderManagement, RewardsManagement},
};
use chrono::Duration;
use cucumber::{given, then, when};
use wb_common::{Paise, Points};

use crate::{
    cucumber::BookingWorld,
    support::{callback, open_order},
};

#[given(expr = "customer '{word}' has {int} reward points")]
async fn seed_points(world: &mut BookingWorld, user: String, points: i64) {
    let tx = NewRewardTransaction::credit(&user, Points::from(points), RewardSource::Admin, "opening balance")
        .with_reference(&format!("seed:{user}:{}", rand::random::<u32>()));
    world.system().rewards.record_transaction(tx).await.expect("Error seeding points");
}

#[given(expr = "customer '{word}' has an open order {word} for workshop {word} costing {int} paise")]
async fn seed_open_order(world: &mut BookingWorld, user: String, label: String, workshop: String, amount: i64) {
    let order = open_order(&world.system().db, &user, &workshop, amount, Duration::minutes(30)).await;
    world.orders.insert(label, order.order_id);
}

#[given(expr = "customer '{word}' has an open order {word} for workshop {word} whose link lapsed {int} minutes ago")]
async fn seed_lapsed_order(world: &mut BookingWorld, user: String, label: String, workshop: String, minutes: i64) {
    let order = open_order(&world.system().db, &user, &workshop, 100_000, Duration::minutes(-minutes)).await;
    world.orders.insert(label, order.order_id);
}

#[given(expr = "customer '{word}' has bundle {word} of {int} orders costing {int} paise each")]
async fn seed_bundle(world: &mut BookingWorld, user: String, bundle: String, count: usize, amount: i64) {
    for i in 1..=count {
        let order = NewOrder::new(&user, vec![format!("ws{i}")], Paise::from(amount))
            .expect("Invalid order")
            .with_bundle_id(bundle.clone());
        let order = world.system().db.insert_order(order).await.expect("Error inserting order");
        world.orders.insert(format!("{bundle}-{i}"), order.order_id);
    }
}

#[given("the payment gateway is down")]
async fn gateway_down(world: &mut BookingWorld) {
    world.system().gateway.set_failing(true);
}

#[when(expr = "customer '{word}' books workshop {word} for {int} rupees as {word}")]
async fn book(world: &mut BookingWorld, user: String, workshop: String, rupees: i64, label: String) {
    let request = BookingRequest::new(&user, vec![workshop], Paise::from_rupees(rupees));
    place(world, request, label).await;
}

#[when(expr = "customer '{word}' books workshop {word} for {int} rupees using {int} points as {word}")]
async fn book_with_points(
    world: &mut BookingWorld,
    user: String,
    workshop: String,
    rupees: i64,
    points: i64,
    label: String,
) {
    let request =
        BookingRequest::new(&user, vec![workshop], Paise::from_rupees(rupees)).with_points(Points::from(points));
    place(world, request, label).await;
}

async fn place(world: &mut BookingWorld, request: BookingRequest, label: String) {
    let user = request.user_id.clone();
    let result = world.system().orders.place_order(request).await;
    match result {
        Ok(order) => {
            world.orders.insert(label, order.order_id);
        },
        Err(e) => {
            // The order, if one was stored, is the user's most recent one
            let orders =
                world.system().orders.list_orders(&user, None, Default::default()).await.expect("Error listing orders");
            if let Some(order) = orders.into_iter().next() {
                world.orders.insert(label, order.order_id);
            }
            world.last_error = Some(e.to_string());
        },
    }
}

#[when(expr = "customer '{word}' redeems {int} points on order {word}")]
async fn redeem(world: &mut BookingWorld, user: String, points: i64, label: String) {
    let order = world.order(&label).await;
    let workshop = order.workshop_ids.0.first().cloned().unwrap_or_default();
    let rewards = &world.system().rewards;
    let result = rewards.redeem(&user, &order.order_id, &workshop, Points::from(points), order.amount).await;
    world.last_error = result.err().map(|e| e.to_string());
}

#[when(expr = "the gateway reports order {word} as {word}")]
async fn gateway_reports_order(world: &mut BookingWorld, label: String, status: String) {
    let reference = world.order_id(&label).to_string();
    deliver(world, &reference, &status).await;
}

#[when(expr = "the gateway reports bundle {word} as {word}")]
async fn gateway_reports_bundle(world: &mut BookingWorld, bundle: String, status: String) {
    deliver(world, &format!("BUNDLE_{bundle}"), &status).await;
}

async fn deliver(world: &mut BookingWorld, reference: &str, status: &str) {
    let (_, outcome) =
        world.system().webhooks.process_callback(callback(reference, status)).await.expect("Error processing callback");
    world.last_outcome = Some(outcome);
}

#[when("the expiry sweeper runs")]
async fn run_sweeper(world: &mut BookingWorld) {
    world.system().sweeper.run_once().await.expect("Expiry sweep failed");
}

#[when("the cashback generator runs")]
async fn run_cashback(world: &mut BookingWorld) {
    world.system().cashback.run_once().await.expect("Cashback run failed");
}

#[when(expr = "cashback for order {word} is credited but the order is not flagged")]
async fn credit_without_flag(world: &mut BookingWorld, label: String) {
    let order = world.order(&label).await;
    world.system().rewards.cashback_for_order(&order).await.expect("Error crediting cashback");
}

#[then(expr = "order {word} is {word}")]
async fn check_order_status(world: &mut BookingWorld, label: String, status: String) {
    let order = world.order(&label).await;
    assert_eq!(order.status.to_string(), status, "Order {label} has the wrong status");
}

#[then(expr = "all orders in bundle {word} are {word}")]
async fn check_bundle_status(world: &mut BookingWorld, bundle: String, status: String) {
    let orders = world.system().db.fetch_orders_for_bundle(&bundle).await.expect("Error fetching bundle");
    assert!(!orders.is_empty(), "Bundle {bundle} has no orders");
    for order in orders {
        assert_eq!(order.status.to_string(), status, "Order {} has the wrong status", order.order_id);
    }
}

#[then("the callback updated an order")]
async fn callback_updated(world: &mut BookingWorld) {
    let outcome = world.last_outcome.as_ref().expect("No callback was delivered");
    assert!(outcome.order_updated, "Expected the callback to update an order");
}

#[then("the callback changed nothing")]
async fn callback_changed_nothing(world: &mut BookingWorld) {
    let outcome = world.last_outcome.as_ref().expect("No callback was delivered");
    assert!(!outcome.order_updated, "Expected the callback to leave orders alone");
    assert!(outcome.processed);
}

#[then(expr = "customer '{word}' has {int} available points")]
async fn check_available(world: &mut BookingWorld, user: String, points: i64) {
    let wallet = world.system().rewards.get_wallet(&user).await.expect("Error fetching wallet");
    assert_eq!(wallet.available_balance, Points::from(points), "Available balance is incorrect");
}

#[then(expr = "customer '{word}' has {int} redeemable points")]
async fn check_redeemable(world: &mut BookingWorld, user: String, points: i64) {
    let redeemable = world.system().rewards.redeemable_balance(&user).await.expect("Error fetching balance");
    assert_eq!(redeemable, Points::from(points), "Redeemable balance is incorrect");
}

#[then(expr = "customer '{word}' has lifetime earnings of {int} points and lifetime redemptions of {int} points")]
async fn check_lifetime(world: &mut BookingWorld, user: String, earned: i64, redeemed: i64) {
    let wallet = world.system().rewards.get_wallet(&user).await.expect("Error fetching wallet");
    assert_eq!(wallet.lifetime_earned, Points::from(earned), "Lifetime earned is incorrect");
    assert_eq!(wallet.lifetime_redeemed, Points::from(redeemed), "Lifetime redeemed is incorrect");
}

#[then(expr = "the wallet of customer '{word}' is balanced")]
async fn check_balanced(world: &mut BookingWorld, user: String) {
    let wallet = world.system().rewards.get_wallet(&user).await.expect("Error fetching wallet");
    assert!(wallet.is_balanced(), "Wallet does not balance: {wallet:?}");
}

#[then(expr = "the reservation for order {word} is {word}")]
async fn check_reservation(world: &mut BookingWorld, label: String, status: String) {
    let id = world.order_id(&label);
    let r = world.system().db.fetch_redemption_for_order(&id).await.expect("Error fetching reservation");
    let r = r.expect("Order has no reservation");
    assert_eq!(r.status.to_string(), status, "Reservation has the wrong status");
}

#[then(expr = "order {word} earned {int} points of cashback")]
async fn check_cashback(world: &mut BookingWorld, label: String, points: i64) {
    let order = world.order(&label).await;
    assert!(order.rewards_generated, "Order has not been flagged as rewarded");
    assert_eq!(order.cashback_amount, Some(Points::from(points)), "Cashback is incorrect");
}

#[then(expr = "customer '{word}' has {int} cashback entries")]
async fn check_cashback_entries(world: &mut BookingWorld, user: String, count: usize) {
    let txs = world.system().db.fetch_transactions(&user, Default::default()).await.expect("Error fetching ledger");
    let n = txs.iter().filter(|t| t.source == RewardSource::Cashback).count();
    assert_eq!(n, count, "Wrong number of cashback entries");
}

#[then(expr = "the request fails with {string}")]
async fn check_error(world: &mut BookingWorld, message: String) {
    let err = world.last_error.as_deref().expect("Expected the last request to fail");
    assert!(err.contains(&message), "Unexpected error: {err}");
}
