//! Workshop Booking Engine
//!
//! The booking engine is the order, payment and rewards reconciliation core of the workshop booking service. It turns
//! a stream of payment gateway callbacks (which may be duplicated, reordered or late) and a periodic expiry sweep into
//! one consistent view of every order's lifecycle and every user's reward-points ledger.
//!
//! The library is divided into these sections:
//! 1. Domain types ([`mod@db_types`]) and reward arithmetic ([`mod@helpers`]).
//! 2. Backend contracts ([`mod@traits`]). A storage backend implements [`BookingDatabase`]; the payment gateway is
//!    reached through [`PaymentGatewayClient`]. [`SqliteDatabase`] is the bundled backend.
//! 3. The public API ([`mod@booking_api`]): [`OrderFlowApi`], [`RewardsApi`] and [`WebhookApi`].
//! 4. Background jobs ([`mod@workers`]): the [`ExpirySweeper`] and the [`CashbackGenerator`].
pub mod booking_api;
pub mod db_types;
pub mod helpers;
pub mod traits;
pub mod workers;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use booking_api::{
    order_flow_api::OrderFlowApi,
    order_objects,
    rewards_api::RewardsApi,
    rewards_objects,
    webhook_api::WebhookApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{BookingDatabase, BookingError, PaymentGatewayClient, RewardsError};
pub use workers::{CashbackGenerator, ExpirySweeper, SweepReport};
