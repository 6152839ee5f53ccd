use std::{collections::HashMap, fmt::Debug, sync::Arc, time::Duration};

use booking_engine::{
    db_types::{Order, OrderId, WebhookOutcome},
    helpers::RewardsConfig,
    traits::OrderManagement,
    BookingDatabase,
    CashbackGenerator,
    ExpirySweeper,
    OrderFlowApi,
    RewardsApi,
    SqliteDatabase,
    WebhookApi,
};
use cucumber::World;

use crate::support::{prepare_test_db, StubGateway};

#[derive(Default, Debug, World)]
pub struct BookingWorld {
    pub system: Option<BookingSystem>,
    /// Orders created during the scenario, keyed by the label the scenario gives them.
    pub orders: HashMap<String, OrderId>,
    pub last_outcome: Option<WebhookOutcome>,
    pub last_error: Option<String>,
}

pub struct BookingSystem {
    pub db: SqliteDatabase,
    pub gateway: Arc<StubGateway>,
    pub orders: OrderFlowApi<SqliteDatabase, StubGateway>,
    pub rewards: RewardsApi<SqliteDatabase>,
    pub webhooks: WebhookApi<SqliteDatabase>,
    pub sweeper: ExpirySweeper<SqliteDatabase>,
    pub cashback: CashbackGenerator<SqliteDatabase>,
}

impl Debug for BookingSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BookingSystem ({})", self.db.url())
    }
}

impl BookingSystem {
    pub async fn new(config: RewardsConfig) -> Self {
        let db = prepare_test_db().await;
        let gateway = Arc::new(StubGateway::default());
        Self {
            orders: OrderFlowApi::new(db.clone(), Arc::clone(&gateway), config),
            rewards: RewardsApi::new(db.clone(), config),
            webhooks: WebhookApi::new(db.clone(), config),
            sweeper: ExpirySweeper::new(db.clone(), config).with_min_spacing(Duration::ZERO),
            cashback: CashbackGenerator::new(db.clone(), config),
            gateway,
            db,
        }
    }
}

impl BookingWorld {
    pub fn system(&self) -> &BookingSystem {
        self.system.as_ref().expect("System not initialised. Start the scenario with 'a fresh install'")
    }

    pub fn order_id(&self, label: &str) -> OrderId {
        self.orders.get(label).cloned().unwrap_or_else(|| panic!("No order labelled {label}"))
    }

    pub async fn order(&self, label: &str) -> Order {
        let id = self.order_id(label);
        self.system().db.fetch_order(&id).await.expect("Error fetching order").expect("Order does not exist")
    }
}
