use actix_web::http::StatusCode;
use booking_engine::{
    db_types::{Order, OrderStatusType},
    traits::GatewayClientError,
};
use serde_json::{json, Value};
use wb_common::Paise;

use super::{
    helpers::{parse, TestServer, LINK_EXPIRY_MINUTES},
    mocks::{link_for, obliging_gateway, MockGateway},
};

fn booking(workshop: &str, rupees: i64) -> Value {
    json!({
        "workshop_ids": [workshop],
        "amount": rupees * 100,
        "customer": { "name": "Asha", "email": "asha@example.com", "phone": "9999999999" },
    })
}

#[actix_web::test]
async fn orders_require_an_authenticated_user() {
    let server = TestServer::new(MockGateway::new()).await;
    let (status, body) = server.get("", "/api/orders").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication required. The X-Authenticated-User header is missing"}"#);
    let (status, _) = server.post_json("", "/api/orders", &booking("pottery", 900)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn place_order_issues_a_payment_link() {
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_link()
        .withf(|req| req.amount == Paise::from(90_000) && req.expire_in_minutes == LINK_EXPIRY_MINUTES)
        .times(1)
        .returning(|req| Ok(link_for(&req)));
    let server = TestServer::new(gateway).await;

    let (status, body) = server.post_json("asha", "/api/orders", &booking("pottery", 900)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = parse(&body);
    assert_eq!(order.user_id, "asha");
    assert_eq!(order.status, OrderStatusType::Created);
    assert_eq!(order.amount, Paise::from(90_000));
    assert_eq!(order.payment_link_url, Some(format!("https://rzp.io/i/plink_{}", order.order_id)));

    // Posting the same booking again returns the same order, without a second link
    let (status, body) = server.post_json("asha", "/api/orders", &booking("pottery", 900)).await;
    assert_eq!(status, StatusCode::OK);
    let again: Order = parse(&body);
    assert_eq!(again.order_id, order.order_id);
}

#[actix_web::test]
async fn invalid_bookings_are_rejected() {
    let server = TestServer::new(MockGateway::new()).await;
    let (status, body) = server.post_json("asha", "/api/orders", &booking("pottery", 0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("error"), "{body}");
    let no_workshops = json!({ "workshop_ids": [], "amount": 1000 });
    let (status, _) = server.post_json("asha", "/api/orders", &no_workshops).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn gateway_failure_marks_the_order_failed() {
    let mut gateway = MockGateway::new();
    gateway.expect_create_link().times(1).returning(|_| Err(GatewayClientError::Network("connection refused".into())));
    let server = TestServer::new(gateway).await;

    let (status, body) = server.post_json("asha", "/api/orders", &booking("pottery", 900)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("connection refused"), "{body}");

    let (status, body) = server.get("asha", "/api/orders?status=failed").await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = parse(&body);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatusType::Failed);
}

#[actix_web::test]
async fn orders_are_private_to_their_owner() {
    let server = TestServer::new(obliging_gateway()).await;
    let (_, body) = server.post_json("asha", "/api/orders", &booking("pottery", 900)).await;
    let order: Order = parse(&body);
    let path = format!("/api/orders/{}", order.order_id);

    let (status, body) = server.get("asha", &path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Order>(&body).order_id, order.order_id);

    let (status, body) = server.get("ravi", &path).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("does not exist"), "{body}");

    let (status, body) = server.get("ravi", "/api/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn list_orders_filters_and_pages() {
    let server = TestServer::new(obliging_gateway()).await;
    for workshop in ["pottery", "weaving", "batik"] {
        let (status, _) = server.post_json("asha", "/api/orders", &booking(workshop, 500)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = server.get("asha", "/api/orders").await;
    assert_eq!(parse::<Vec<Order>>(&body).len(), 3);
    let (_, body) = server.get("asha", "/api/orders?status=created&page=1&count=2").await;
    assert_eq!(parse::<Vec<Order>>(&body).len(), 2);
    let (_, body) = server.get("asha", "/api/orders?status=created&page=2&count=2").await;
    assert_eq!(parse::<Vec<Order>>(&body).len(), 1);
    let (_, body) = server.get("asha", "/api/orders?status=paid").await;
    assert_eq!(body, "[]");
    let (status, body) = server.get("asha", "/api/orders?status=refunded").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Unknown order status"), "{body}");
}

#[actix_web::test]
async fn active_order_lookup() {
    let server = TestServer::new(obliging_gateway()).await;
    let (_, body) = server.post_json("asha", "/api/orders", &booking("pottery", 900)).await;
    let order: Order = parse(&body);

    let (status, body) = server.get("asha", "/api/orders/active/pottery").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Order>(&body).order_id, order.order_id);

    let (status, _) = server.get("asha", "/api/orders/active/weaving").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server.get("ravi", "/api/orders/active/pottery").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
