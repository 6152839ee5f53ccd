//! # Backend contracts
//!
//! The traits in this module define what a storage backend (and the payment gateway) must provide for the booking
//! engine to work.
//!
//! * [`BookingDatabase`] is the umbrella trait that a full backend implements.
//! * [`OrderManagement`] stores orders and owns the order state machine's conditional transition.
//! * [`RewardsManagement`] stores wallets, the reward ledger and redemption reservations.
//! * [`WebhookAudit`] keeps the audit trail of inbound gateway callbacks.
//! * [`PaymentGatewayClient`] is the outbound capability to issue and cancel hosted payment links.
mod booking_database;
mod data_objects;
mod order_management;
mod payment_gateway_client;
mod rewards_management;
mod webhook_audit;

pub use booking_database::{BookingDatabase, BookingError, RewardsError};
pub use data_objects::{OrderQueryFilter, Pagination, RecordOutcome, ReservationOutcome, TransitionOutcome};
pub use order_management::OrderManagement;
pub use payment_gateway_client::{CustomerDetails, GatewayClientError, PaymentGatewayClient, PaymentLinkRequest};
pub use rewards_management::RewardsManagement;
pub use webhook_audit::WebhookAudit;
