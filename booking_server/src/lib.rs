//! # Workshop booking server
//! The HTTP face of the booking engine. It is responsible for:
//! * Placing workshop bookings and handing out payment links.
//! * Receiving payment gateway callbacks and reconciling them with orders.
//! * Serving order history and the rewards wallet to the booking pages.
//! * Running the expiry and cashback workers in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: Liveness check.
//! * `/payment/callback`: Payment gateway callbacks (GET or POST).
//! * `/api/orders`, `/api/orders/active/{workshop_id}`, `/api/orders/{order_id}`: Bookings.
//! * `/api/rewards/wallet`, `/api/rewards/transactions`, `/api/rewards/calculate`, `/api/rewards/redeem`: Rewards.
//!
//! Routes under `/api` expect the authenticated user id in the `X-Authenticated-User` header.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod gateway_client;
pub mod routes;
pub mod server;
pub mod workers;

#[cfg(test)]
mod endpoint_tests;
