//! Prepaid balance ledger with dual-currency display and metered-route
//! billing.
//!
//! The binary in `main.rs` serves [`app::build_app`] over Postgres; the
//! library is what other services and the integration tests embed.

pub mod app;
pub mod config;
pub mod currency;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
