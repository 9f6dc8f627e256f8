//! Ledger storage boundary.
//!
//! `LedgerStore` is the only path through which balances change. Every
//! implementation must provide:
//!
//! - an atomic conditional debit ("decrement only if balance >= amount",
//!   reporting whether it matched), and
//! - transactional grouping of the balance update with the ledger entry
//!   append, so neither write can commit without the other.
//!
//! Two implementations ship with the crate: [`PgLedgerStore`] for
//! production and [`InMemoryLedgerStore`] for tests and local runs.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{
    account::{Account, AccountId},
    ledger_entry::{LedgerEntry, NewLedgerEntry},
    pricing::ServicePricing,
};

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Infrastructure failure inside a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("balance of account {0} would overflow")]
    BalanceOverflow(AccountId),
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts the account at zero balance if absent, then returns it.
    ///
    /// Safe under concurrent calls: the insert is a no-op when the row exists.
    async fn ensure_account(&self, account_id: AccountId) -> Result<Account, StoreError>;

    /// Current balance without creating the account.
    async fn balance_of(&self, account_id: AccountId) -> Result<Option<Decimal>, StoreError>;

    /// Increments the balance by `entry.amount` (creating the account when
    /// needed) and appends `entry`, atomically.
    ///
    /// `entry.amount` must be positive.
    async fn credit(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError>;

    /// Decrements the balance by `entry.magnitude()` only if the balance
    /// covers it, appending `entry` in the same transaction.
    ///
    /// Returns `Ok(None)` when the conditional update matched no row
    /// (insufficient funds or unknown account); nothing is written then.
    async fn debit_if_sufficient(
        &self,
        entry: NewLedgerEntry,
    ) -> Result<Option<LedgerEntry>, StoreError>;

    /// Most recent entries first, at most `limit` of them.
    async fn entries(
        &self,
        account_id: AccountId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Active catalog entries.
    async fn service_pricing(&self) -> Result<Vec<ServicePricing>, StoreError>;

    /// Catalog entry for one service, active or not.
    async fn price_for(&self, service_name: &str) -> Result<Option<ServicePricing>, StoreError>;

    /// All accounts, most recently updated first.
    async fn accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Connectivity check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}
