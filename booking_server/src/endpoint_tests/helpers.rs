use std::sync::Arc;

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, App};
use booking_engine::{
    helpers::RewardsConfig,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    SqliteDatabase,
};
use log::debug;
use serde::de::DeserializeOwned;

use super::mocks::MockGateway;
use crate::{
    auth::USER_HEADER,
    server::{configure_routes, BookingApis},
};

pub const LINK_EXPIRY_MINUTES: i64 = 30;

/// A fresh database and a gateway mock, shared by every request a test makes.
pub struct TestServer {
    pub db: SqliteDatabase,
    pub gateway: Arc<MockGateway>,
}

impl TestServer {
    pub async fn new(gateway: MockGateway) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to test database");
        Self { db, gateway: Arc::new(gateway) }
    }

    pub async fn send(&self, req: TestRequest) -> Result<(StatusCode, String), String> {
        let config = RewardsConfig::default();
        let apis = BookingApis::new(self.db.clone(), self.gateway.clone(), config, LINK_EXPIRY_MINUTES);
        let app = App::new().configure(|cfg| configure_routes(cfg, apis));
        let service = test::init_service(app).await;
        debug!("Making request");
        let res = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?;
        let (_, res) = res.into_parts();
        let status = res.status();
        let body = res.into_body().try_into_bytes().map_err(|_| "Could not read response body".to_string())?;
        Ok((status, String::from_utf8_lossy(&body).into_owned()))
    }

    pub async fn get(&self, user: &str, path: &str) -> (StatusCode, String) {
        self.send(as_user(TestRequest::get().uri(path), user)).await.expect("Request failed")
    }

    pub async fn post_json<T: serde::Serialize>(&self, user: &str, path: &str, body: &T) -> (StatusCode, String) {
        self.send(as_user(TestRequest::post().uri(path).set_json(body), user)).await.expect("Request failed")
    }
}

fn as_user(req: TestRequest, user: &str) -> TestRequest {
    match user.is_empty() {
        true => req,
        false => req.insert_header((USER_HEADER, user)),
    }
}

pub fn parse<T: DeserializeOwned>(body: &str) -> T {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Unexpected response body {body}. {e}"))
}
