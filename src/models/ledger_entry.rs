//! Ledger entry data models and API request/response types.
//!
//! This module defines:
//! - `LedgerEntry`: Immutable database record of one balance-affecting event
//! - `NewLedgerEntry`: Entry about to be appended by the store
//! - Request types for charge, deposit and refund operations
//! - `TransactionResponse`: Response body returned to clients

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::account::AccountId;

/// Kind of balance-affecting event.
///
/// Stored in Postgres as the `ledger_entry_kind` enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "ledger_entry_kind", rename_all = "lowercase")]
pub enum EntryKind {
    /// Top-up credited by an administrator
    Deposit,
    /// Payment for a metered service
    Charge,
    /// Offsetting credit for a previous charge
    Refund,
}

/// Represents a ledger entry record from the database.
///
/// # Database Table
///
/// Maps to the `ledger_entries` table. Entries are append-only: the table
/// rejects UPDATE and DELETE, and corrections are written as new
/// offsetting entries. For every account the balance equals the sum of
/// its entry amounts.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct LedgerEntry {
    /// Monotonic identifier; its order is the audit trail order
    pub id: i64,

    /// Account whose balance this entry changed
    pub account_id: AccountId,

    /// Signed amount in the primary currency
    ///
    /// Positive for deposits and refunds, negative for charges.
    pub amount: Decimal,

    pub kind: EntryKind,

    /// Service that was billed (charges and refunds only)
    pub service_name: Option<String>,

    pub description: String,

    /// Administrator who issued the credit (deposits and refunds only)
    pub admin_actor: Option<AccountId>,

    pub created_at: DateTime<Utc>,
}

/// Ledger entry that has not been committed yet.
///
/// Built through the kind-specific constructors so the sign of `amount`
/// always matches `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub service_name: Option<String>,
    pub description: String,
    pub admin_actor: Option<AccountId>,
}

impl NewLedgerEntry {
    pub fn deposit(
        account_id: AccountId,
        amount: Decimal,
        admin_actor: AccountId,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            amount,
            kind: EntryKind::Deposit,
            service_name: None,
            description: description.into(),
            admin_actor: Some(admin_actor),
        }
    }

    /// Charge entry; `amount` is the positive price, stored negated.
    pub fn charge(
        account_id: AccountId,
        amount: Decimal,
        service_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            amount: -amount,
            kind: EntryKind::Charge,
            service_name: Some(service_name.into()),
            description: description.into(),
            admin_actor: None,
        }
    }

    pub fn refund(
        account_id: AccountId,
        amount: Decimal,
        service_name: impl Into<String>,
        admin_actor: AccountId,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            amount,
            kind: EntryKind::Refund,
            service_name: Some(service_name.into()),
            description: description.into(),
            admin_actor: Some(admin_actor),
        }
    }

    /// Magnitude of the balance change.
    pub fn magnitude(&self) -> Decimal {
        self.amount.abs()
    }
}

/// Request to charge the calling account for a service.
///
/// # JSON Example
///
/// ```json
/// {
///   "amount": "30.00",
///   "service_name": "ai_request",
///   "description": "gpt call"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct ChargeRequest {
    pub amount: Decimal,
    pub service_name: String,
    pub description: Option<String>,
}

/// Request to top up an account (admin only).
///
/// # JSON Example
///
/// ```json
/// {
///   "account_id": 42,
///   "amount": "100.00",
///   "description": "topup"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub description: Option<String>,
}

/// Request to refund a previous charge (admin only).
#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub service_name: String,
    pub description: Option<String>,
}

/// Query parameters for the transaction history endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionsQuery {
    pub limit: Option<i64>,
}

/// Ledger entry as returned to API clients.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": 17,
///   "amount": "-30.00",
///   "kind": "charge",
///   "service": "ai_request",
///   "description": "gpt call",
///   "created_at": "2025-12-21T16:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: i64,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub service: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for TransactionResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            amount: entry.amount,
            kind: entry.kind,
            service: entry.service_name,
            description: entry.description,
            created_at: entry.created_at,
        }
    }
}

/// Response body for successful balance mutations.
///
/// `ok` is always `true` here; declines and failures use the error body.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub ok: bool,
    pub transaction: TransactionResponse,
}

impl From<LedgerEntry> for MutationResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            ok: true,
            transaction: entry.into(),
        }
    }
}
