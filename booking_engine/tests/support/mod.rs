#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use booking_engine::{
    db_types::{GatewayCallback, NewOrder, Order, OrderId, PaymentLink},
    traits::{GatewayClientError, OrderManagement, PaymentGatewayClient, PaymentLinkRequest},
    SqliteDatabase,
};
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use wb_common::Paise;

pub async fn prepare_test_db() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = format!("sqlite://{}/wb_it_{:016x}.db", std::env::temp_dir().display(), rand::random::<u64>());
    Sqlite::create_database(&url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    db
}

/// Creates an open order with a payment link that expires `expires_in` from now.
pub async fn open_order(db: &SqliteDatabase, user: &str, workshop: &str, amount: i64, expires_in: Duration) -> Order {
    let order = NewOrder::new(user, vec![workshop.to_string()], Paise::from(amount)).unwrap();
    let order = db.insert_order(order).await.unwrap();
    let link = PaymentLink {
        link_id: format!("plink_{}", order.order_id),
        url: format!("https://pay.example.com/{}", order.order_id),
        expire_at: Some(Utc::now() + expires_in),
        raw: json!({}),
    };
    db.attach_payment_link(&order.order_id, &link).await.unwrap()
}

pub fn callback(reference: &str, status: &str) -> GatewayCallback {
    GatewayCallback {
        payment_id: Some(format!("pay_{reference}")),
        payment_link_id: Some(format!("plink_{reference}")),
        payment_link_reference_id: Some(reference.to_string()),
        payment_link_status: Some(status.to_string()),
        signature: Some("sig".to_string()),
        raw: json!({ "payment_link_reference_id": reference, "payment_link_status": status }),
    }
}

/// A payment gateway that hands out links without talking to anyone. It can be told to fail.
#[derive(Debug, Default)]
pub struct StubGateway {
    fail: AtomicBool,
    pub created: Mutex<Vec<PaymentLinkRequest>>,
    pub cancelled: Mutex<Vec<String>>,
}

impl StubGateway {
    pub fn failing() -> Self {
        let gw = Self::default();
        gw.fail.store(true, Ordering::SeqCst);
        gw
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<PaymentLinkRequest> {
        self.created.lock().unwrap().last().cloned()
    }

    pub fn cancelled_links(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl PaymentGatewayClient for StubGateway {
    async fn create_link(&self, request: PaymentLinkRequest) -> Result<PaymentLink, GatewayClientError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayClientError::Network("connection refused".into()));
        }
        let link = PaymentLink {
            link_id: format!("plink_{}", request.order_id),
            url: format!("https://pay.example.com/{}", request.order_id),
            expire_at: Some(Utc::now() + Duration::minutes(request.expire_in_minutes)),
            raw: json!({ "reference_id": request.reference_id, "amount": request.amount }),
        };
        self.created.lock().unwrap().push(request);
        Ok(link)
    }

    async fn cancel_link(&self, link_id: &str) -> Result<(), GatewayClientError> {
        self.cancelled.lock().unwrap().push(link_id.to_string());
        Ok(())
    }
}

pub fn oid(order: &Order) -> OrderId {
    order.order_id.clone()
}
