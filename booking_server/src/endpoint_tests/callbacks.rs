use actix_web::{http::StatusCode, test::TestRequest};
use booking_engine::{
    db_types::{Order, OrderStatusType},
    traits::WebhookAudit,
};
use serde_json::json;

use super::{
    helpers::{parse, TestServer},
    mocks::obliging_gateway,
};
use crate::data_objects::CallbackAck;

async fn open_order(server: &TestServer, user: &str, workshop: &str) -> Order {
    let body = json!({ "workshop_ids": [workshop], "amount": 50_000 });
    let (status, body) = server.post_json(user, "/api/orders", &body).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    parse(&body)
}

async fn order_status(server: &TestServer, order: &Order) -> OrderStatusType {
    let (_, body) = server.get(&order.user_id, &format!("/api/orders/{}", order.order_id)).await;
    parse::<Order>(&body).status
}

async fn callback(server: &TestServer, req: TestRequest) -> CallbackAck {
    let (status, body) = server.send(req).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    parse(&body)
}

#[actix_web::test]
async fn redirect_callback_marks_the_order_paid() {
    let server = TestServer::new(obliging_gateway()).await;
    let order = open_order(&server, "asha", "pottery").await;
    let uri = format!(
        "/payment/callback?razorpay_payment_id=pay_9&razorpay_payment_link_id=plink_9&\
         razorpay_payment_link_reference_id={}&razorpay_payment_link_status=paid&razorpay_signature=abc",
        order.order_id
    );

    let ack = callback(&server, TestRequest::get().uri(&uri)).await;
    assert_eq!(ack.status, "ok");
    assert!(ack.processed);
    assert!(ack.order_updated);
    assert_eq!(order_status(&server, &order).await, OrderStatusType::Paid);

    let event_id = ack.event_id.expect("The callback was not audited");
    let event = server.db.fetch_webhook_event(event_id).await.unwrap().expect("Audit entry missing");
    assert_eq!(event.payment_id.as_deref(), Some("pay_9"));
    assert_eq!(event.raw_request.0["razorpay_signature"], "abc");

    // A repeat delivery is acknowledged but changes nothing
    let ack = callback(&server, TestRequest::get().uri(&uri)).await;
    assert!(ack.processed);
    assert!(!ack.order_updated);
    assert_ne!(ack.event_id, Some(event_id));
}

#[actix_web::test]
async fn form_and_json_notifications_are_accepted() {
    let server = TestServer::new(obliging_gateway()).await;
    let pottery = open_order(&server, "asha", "pottery").await;
    let weaving = open_order(&server, "asha", "weaving").await;

    let form = format!("payment_link_reference_id={}&payment_link_status=cancelled", pottery.order_id);
    let req = TestRequest::post()
        .uri("/payment/callback")
        .insert_header(("content-type", "application/x-www-form-urlencoded"))
        .set_payload(form);
    let ack = callback(&server, req).await;
    assert!(ack.order_updated);
    assert_eq!(order_status(&server, &pottery).await, OrderStatusType::Cancelled);

    let body = json!({ "payment_link_reference_id": weaving.order_id, "payment_link_status": "expired" });
    let ack = callback(&server, TestRequest::post().uri("/payment/callback").set_json(body)).await;
    assert!(ack.order_updated);
    assert_eq!(order_status(&server, &weaving).await, OrderStatusType::Expired);
}

#[actix_web::test]
async fn unusable_callbacks_are_still_acknowledged() {
    let server = TestServer::new(obliging_gateway()).await;

    let ack = callback(&server, TestRequest::post().uri("/payment/callback")).await;
    assert!(ack.processed);
    assert!(!ack.order_updated);

    let body = json!({ "payment_link_reference_id": "ord_missing", "payment_link_status": "paid" });
    let ack = callback(&server, TestRequest::post().uri("/payment/callback").set_json(body)).await;
    assert!(!ack.order_updated);
    let event = server.db.fetch_webhook_event(ack.event_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(event.processing_error.as_deref(), Some("no order found for reference ord_missing"));

    let req = TestRequest::post()
        .uri("/payment/callback")
        .insert_header(("content-type", "application/json"))
        .set_payload("{ not json");
    let ack = callback(&server, req).await;
    assert!(!ack.order_updated);
    let event = server.db.fetch_webhook_event(ack.event_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(event.raw_request.0["unparsed"], "{ not json");
}
