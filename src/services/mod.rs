//! Business logic services.
//!
//! Services contain the ledger's core logic separated from HTTP handlers.
//! They own transaction boundaries, validation and logging of outcomes.

pub mod balance_service;
pub mod billing_gate;
