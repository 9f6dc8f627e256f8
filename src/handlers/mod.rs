//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, query, caller context)
//! 2. Delegates to the balance service
//! 3. Returns HTTP response (JSON, status code)

/// Administrator-only endpoints
pub mod admin;
/// Caller-facing billing endpoints
pub mod billing;
/// Service health endpoint
pub mod health;
