//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables.

/// Ledger account model
pub mod account;
/// Append-only ledger entry model
pub mod ledger_entry;
/// Service pricing catalog
pub mod pricing;
