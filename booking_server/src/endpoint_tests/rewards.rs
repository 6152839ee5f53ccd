use actix_web::http::StatusCode;
use booking_engine::{
    db_types::{NewRewardTransaction, Order, RewardSource, RewardTransaction, RewardWallet},
    helpers::RewardsConfig,
    order_objects::RedeemedOrder,
    rewards_objects::RedemptionQuote,
    traits::RewardsManagement,
    RewardsApi,
};
use serde_json::json;
use wb_common::{Paise, Points};

use super::{
    helpers::{parse, TestServer},
    mocks::{link_for, obliging_gateway, MockGateway},
};

async fn credit(server: &TestServer, user: &str, points: i64) {
    let api = RewardsApi::new(server.db.clone(), RewardsConfig::default());
    let tx = NewRewardTransaction::credit(user, Points::from(points), RewardSource::Admin, "Goodwill credit");
    api.record_transaction(tx).await.expect("Could not credit points");
}

async fn place_order(server: &TestServer, user: &str, rupees: i64) -> Order {
    let body = json!({ "workshop_ids": ["pottery"], "amount": rupees * 100 });
    let (status, body) = server.post_json(user, "/api/orders", &body).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    parse(&body)
}

#[actix_web::test]
async fn new_users_get_an_empty_wallet() {
    let server = TestServer::new(MockGateway::new()).await;
    let (status, body) = server.get("asha", "/api/rewards/wallet").await;
    assert_eq!(status, StatusCode::OK);
    let wallet: RewardWallet = parse(&body);
    assert_eq!(wallet.user_id, "asha");
    assert_eq!(wallet.total_balance, Points::from(0));
    assert_eq!(wallet.available_balance, Points::from(0));

    let (status, body) = server.get("asha", "/api/rewards/transactions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");

    let (status, _) = server.get("", "/api/rewards/wallet").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn wallet_and_transactions_reflect_credits() {
    let server = TestServer::new(MockGateway::new()).await;
    credit(&server, "asha", 120).await;
    credit(&server, "asha", 30).await;

    let (_, body) = server.get("asha", "/api/rewards/wallet").await;
    let wallet: RewardWallet = parse(&body);
    assert_eq!(wallet.available_balance, Points::from(150));
    assert_eq!(wallet.lifetime_earned, Points::from(150));

    let (status, body) = server.get("asha", "/api/rewards/transactions?page=1&count=1").await;
    assert_eq!(status, StatusCode::OK);
    let txs: Vec<RewardTransaction> = parse(&body);
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].amount, Points::from(30));
    assert_eq!(txs[0].source, RewardSource::Admin);
}

#[actix_web::test]
async fn calculate_redemption_applies_the_caps() {
    let server = TestServer::new(MockGateway::new()).await;
    credit(&server, "asha", 1_000).await;

    // 10% of ₹1,000 is ₹100, or 100 points
    let (status, body) = server.get("asha", "/api/rewards/calculate?amount=100000").await;
    assert_eq!(status, StatusCode::OK);
    let quote: RedemptionQuote = parse(&body);
    assert_eq!(quote.available_points, Points::from(1_000));
    assert_eq!(quote.max_points, Points::from(100));
    assert_eq!(quote.max_discount, Paise::from_rupees(100));
    assert_eq!(quote.recommended_points, quote.max_points);

    // 10% of ₹10,000 is ₹1,000, but the per-workshop cap is ₹500
    let (_, body) = server.get("asha", "/api/rewards/calculate?amount=1000000").await;
    assert_eq!(parse::<RedemptionQuote>(&body).max_points, Points::from(500));

    let (status, _) = server.get("asha", "/api/rewards/calculate?amount=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = server.get("asha", "/api/rewards/calculate").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn redeeming_reissues_the_payment_link() {
    let mut gateway = MockGateway::new();
    let mut seq = mockall::Sequence::new();
    gateway
        .expect_create_link()
        .withf(|req| req.amount == Paise::from_rupees(1_000))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|req| Ok(link_for(&req)));
    gateway.expect_cancel_link().times(1).in_sequence(&mut seq).returning(|_| Ok(()));
    gateway
        .expect_create_link()
        .withf(|req| req.amount == Paise::from_rupees(950) && req.customer.email == "asha@example.com")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|req| Ok(link_for(&req)));
    let server = TestServer::new(gateway).await;
    credit(&server, "asha", 200).await;
    let booking = json!({
        "workshop_ids": ["pottery"],
        "amount": 100_000,
        "customer": { "name": "Asha", "email": "asha@example.com", "phone": "9999999999" },
    });
    let (status, body) = server.post_json("asha", "/api/orders", &booking).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = parse(&body);

    let redeem = json!({ "order_id": order.order_id, "points": 50 });
    let (status, body) = server.post_json("asha", "/api/rewards/redeem", &redeem).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let redeemed: RedeemedOrder = parse(&body);
    let reservation = server.db.fetch_redemption_for_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(redeemed.redemption_id, reservation.id);
    let order = redeemed.order;
    assert_eq!(order.points_redeemed, Some(Points::from(50)));
    assert_eq!(order.final_amount_paid, Some(Paise::from_rupees(950)));

    // The reserved points are no longer on offer
    let (_, body) = server.get("asha", "/api/rewards/calculate?amount=100000").await;
    assert_eq!(parse::<RedemptionQuote>(&body).available_points, Points::from(150));
}

#[actix_web::test]
async fn redemption_errors_are_reported() {
    let server = TestServer::new(obliging_gateway()).await;
    credit(&server, "asha", 1_000).await;
    let order = place_order(&server, "asha", 1_000).await;

    let redeem = json!({ "order_id": order.order_id, "points": 150 });
    let (status, body) = server.post_json("asha", "/api/rewards/redeem", &redeem).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Discount cannot exceed 10% of order amount (₹100.00)"}"#);

    let redeem = json!({ "order_id": order.order_id, "points": 0 });
    let (status, body) = server.post_json("asha", "/api/rewards/redeem", &redeem).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("must be positive"), "{body}");

    let redeem = json!({ "order_id": order.order_id, "points": 50 });
    let (status, _) = server.post_json("ravi", "/api/rewards/redeem", &redeem).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    credit(&server, "ravi", 20).await;
    let ravi_order = place_order(&server, "ravi", 1_000).await;
    let redeem = json!({ "order_id": ravi_order.order_id, "points": 50 });
    let (status, body) = server.post_json("ravi", "/api/rewards/redeem", &redeem).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Insufficient points"), "{body}");
}
