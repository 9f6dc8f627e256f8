//! Account data models and API response types.
//!
//! This module defines:
//! - `AccountId`: Opaque user identifier issued by the identity gateway
//! - `Account`: Database entity holding one user's spendable balance
//! - `AccountBalance`: Admin projection with the dual-currency view attached

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::DualCurrencyView;

/// Identifier of a ledger account.
///
/// Accounts are keyed by the user id the upstream identity gateway assigns,
/// so the ledger never mints ids of its own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AccountId(pub i64);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AccountId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `accounts` table. Each account:
/// - Is created lazily the first time it is touched (never deleted)
/// - Has a balance that is never negative (enforced by CHECK constraint
///   and by the conditional update used for charges)
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Account {
    /// User id this balance belongs to
    pub account_id: AccountId,

    /// Current balance in the primary currency
    pub balance: Decimal,

    /// Timestamp of last balance update
    pub updated_at: DateTime<Utc>,
}

/// Account with its balance rendered in both currencies.
///
/// Returned by the administrative listing endpoint.
///
/// # JSON Example
///
/// ```json
/// {
///   "account_id": 42,
///   "balance": {
///     "amount_primary": "100.00",
///     "amount_secondary": "10.00",
///     "currency_primary": "RUB",
///     "currency_secondary": "BT",
///     "symbol_primary": "₽",
///     "symbol_secondary": "💎"
///   },
///   "updated_at": "2025-12-20T10:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub balance: DualCurrencyView,
    pub updated_at: DateTime<Utc>,
}
