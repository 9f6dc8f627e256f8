//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate callers
//! - Check balances before metered operations
//! - Charge after the operation succeeded
//! - Short-circuit requests (reject unauthorized or unfunded)

/// Service key and caller identity middleware
pub mod auth;

/// Admission and settlement for metered routes
pub mod billing;
