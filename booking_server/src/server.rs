use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use booking_engine::{
    helpers::RewardsConfig,
    OrderFlowApi,
    PaymentGatewayClient,
    RewardsApi,
    SqliteDatabase,
    WebhookApi,
};
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    gateway_client::PaymentLinkClient,
    routes::{
        health,
        ActiveOrderRoute,
        CalculateRoute,
        ListOrdersRoute,
        OrderByIdRoute,
        PaymentCallbackRoute,
        PaymentNotificationRoute,
        PlaceOrderRoute,
        RedeemRoute,
        TransactionsRoute,
        WalletRoute,
    },
    workers::start_workers,
};

const MAX_DB_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::create_if_missing(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway =
        PaymentLinkClient::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let workers = start_workers(&config, db.clone());
    let srv = create_server_instance(config, db, Arc::new(gateway))?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    info!("🚀️ Server stopped. Shutting down workers");
    workers.shutdown().await;
    result
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: Arc<PaymentLinkClient>,
) -> Result<Server, ServerError> {
    let rewards_config = config.rewards;
    let link_expiry_minutes = config.link_expiry_minutes;
    let srv = HttpServer::new(move || {
        let apis = BookingApis::new(db.clone(), gateway.clone(), rewards_config, link_expiry_minutes);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("wb::access_log"))
            .configure(|cfg| configure_routes(cfg, apis))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// The engine APIs shared by the route handlers.
pub struct BookingApis<G> {
    pub orders: OrderFlowApi<SqliteDatabase, G>,
    pub rewards: RewardsApi<SqliteDatabase>,
    pub webhooks: WebhookApi<SqliteDatabase>,
}

impl<G> BookingApis<G> {
    pub fn new(db: SqliteDatabase, gateway: Arc<G>, rewards_config: RewardsConfig, link_expiry_minutes: i64) -> Self {
        let orders =
            OrderFlowApi::new(db.clone(), gateway, rewards_config).with_link_expiry_minutes(link_expiry_minutes);
        let rewards = RewardsApi::new(db.clone(), rewards_config);
        let webhooks = WebhookApi::new(db, rewards_config);
        Self { orders, rewards, webhooks }
    }
}

/// Registers the API data and every route. The gateway client type is left open so that tests can substitute their
/// own.
pub fn configure_routes<G>(cfg: &mut web::ServiceConfig, apis: BookingApis<G>)
where G: PaymentGatewayClient + 'static {
    let api_scope = web::scope("/api")
        .service(PlaceOrderRoute::<SqliteDatabase, G>::new())
        .service(ListOrdersRoute::<SqliteDatabase, G>::new())
        .service(ActiveOrderRoute::<SqliteDatabase, G>::new())
        .service(OrderByIdRoute::<SqliteDatabase, G>::new())
        .service(WalletRoute::<SqliteDatabase>::new())
        .service(TransactionsRoute::<SqliteDatabase>::new())
        .service(CalculateRoute::<SqliteDatabase>::new())
        .service(RedeemRoute::<SqliteDatabase, G>::new());
    cfg.app_data(web::Data::new(apis.orders))
        .app_data(web::Data::new(apis.rewards))
        .app_data(web::Data::new(apis.webhooks))
        .service(health)
        .service(PaymentCallbackRoute::<SqliteDatabase>::new())
        .service(PaymentNotificationRoute::<SqliteDatabase>::new())
        .service(api_scope);
}
