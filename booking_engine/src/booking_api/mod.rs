//! # Booking engine public API
//!
//! * [`order_flow_api`] places bookings, issues payment links and answers order queries.
//! * [`rewards_api`] manages reward wallets, the points ledger, redemptions and cashback.
//! * [`webhook_api`] reconciles payment gateway callbacks with orders and reservations.
//!
//! Every API is created from a database backend that implements the traits in [`crate::traits`]:
//!
//! ```rust,ignore
//! use booking_engine::{helpers::RewardsConfig, RewardsApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/wb_store.db", 5).await?;
//! let api = RewardsApi::new(db, RewardsConfig::default());
//! let wallet = api.get_wallet("alice").await?;
//! ```
pub mod order_flow_api;
pub mod order_objects;
pub mod rewards_api;
pub mod rewards_objects;
pub mod webhook_api;
