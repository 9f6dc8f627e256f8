//! Balance service - the transactional core of the ledger.
//!
//! This service handles:
//! - Lazy account creation on first read
//! - Atomic deposits, charges and refunds
//! - Transaction history and administrative projections
//!
//! # Failure Model
//!
//! No operation panics or leaks a store error past this boundary without
//! logging it. Mutations return `Result<LedgerEntry, LedgerError>`; reads
//! degrade to an empty/zero result when the store is unreachable.
//! Insufficient funds is a business outcome (warn), store faults are
//! infrastructure failures (error). Nothing is retried here: deposits and
//! charges are not idempotent.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::{
    currency::{CurrencyConverter, DualCurrencyView},
    models::{
        account::{AccountBalance, AccountId},
        ledger_entry::{LedgerEntry, NewLedgerEntry},
        pricing::ServicePricing,
    },
    store::{LedgerStore, StoreError},
};

/// Amounts may carry at most this many decimal places (NUMERIC(18, 2)).
pub const AMOUNT_SCALE: u32 = 2;

/// Largest amount a single mutation may carry: 9999999999999999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_808_348_671, 232_830_643, 0, false, 2);

/// Why a balance mutation did not happen.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Business decline; the account was left untouched.
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Decimal, required: Decimal },

    #[error("ledger store unavailable")]
    StoreUnavailable(#[source] StoreError),
}

/// Minimum transactable amounts and history paging bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerLimits {
    pub min_deposit: Decimal,
    pub min_charge: Decimal,
    pub default_history: i64,
    pub max_history: i64,
}

impl Default for LedgerLimits {
    fn default() -> Self {
        Self {
            min_deposit: Decimal::ONE,
            min_charge: Decimal::new(1, 2),
            default_history: 50,
            max_history: 500,
        }
    }
}

/// Entry point for every balance read and mutation.
///
/// Constructed explicitly and cloned into request handlers; clones share
/// the same store.
#[derive(Clone)]
pub struct BalanceService {
    store: Arc<dyn LedgerStore>,
    converter: CurrencyConverter,
    limits: LedgerLimits,
}

impl BalanceService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        converter: CurrencyConverter,
        limits: LedgerLimits,
    ) -> Self {
        Self {
            store,
            converter,
            limits,
        }
    }

    pub fn converter(&self) -> &CurrencyConverter {
        &self.converter
    }

    pub fn limits(&self) -> &LedgerLimits {
        &self.limits
    }

    /// Balance of `account_id` in both currencies.
    ///
    /// Creates the account at zero when it does not exist yet. Always
    /// returns a view; a store fault is logged and reported as zero.
    pub async fn balance(&self, account_id: AccountId) -> DualCurrencyView {
        match self.store.ensure_account(account_id).await {
            Ok(account) => self.converter.view(account.balance),
            Err(err) => {
                tracing::error!(%account_id, error = %err, "failed to read balance");
                self.converter.view(Decimal::ZERO)
            }
        }
    }

    /// Current balance without creating the account; store faults propagate.
    pub(crate) async fn snapshot(&self, account_id: AccountId) -> Result<Decimal, StoreError> {
        Ok(self
            .store
            .balance_of(account_id)
            .await?
            .unwrap_or(Decimal::ZERO))
    }

    /// Credit `amount` to `account_id` on behalf of administrator `actor`.
    ///
    /// # Process
    ///
    /// 1. Validate amount (positive, at least the configured minimum)
    /// 2. Increment balance and append a deposit entry in one transaction
    ///
    /// Calling this twice with identical arguments credits twice.
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        actor: AccountId,
        description: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        validate_amount(amount, self.limits.min_deposit)?;

        let entry = NewLedgerEntry::deposit(account_id, amount, actor, description);
        let recorded = self.store.credit(entry).await.map_err(|err| {
            tracing::error!(%account_id, %amount, %actor, error = %err, "deposit failed");
            LedgerError::StoreUnavailable(err)
        })?;

        tracing::info!(%account_id, %amount, %actor, entry_id = recorded.id, "balance deposited");
        Ok(recorded)
    }

    /// Debit `amount` from `account_id` for `service_name`.
    ///
    /// # Process
    ///
    /// 1. Validate amount
    /// 2. Conditionally decrement the balance (only if it covers `amount`)
    /// 3. If no row matched: decline, nothing written
    /// 4. Otherwise append the charge entry and commit
    ///
    /// Sufficiency is decided by the store in the same statement that
    /// applies the decrement, so a balance read earlier by the caller is
    /// never trusted.
    pub async fn charge(
        &self,
        account_id: AccountId,
        amount: Decimal,
        service_name: &str,
        description: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        validate_amount(amount, self.limits.min_charge)?;

        let entry = NewLedgerEntry::charge(account_id, amount, service_name, description);
        match self.store.debit_if_sufficient(entry).await {
            Ok(Some(recorded)) => {
                tracing::info!(
                    %account_id,
                    %amount,
                    service = service_name,
                    entry_id = recorded.id,
                    "balance charged"
                );
                Ok(recorded)
            }
            Ok(None) => {
                // Only used for the decline message; may already be stale
                let balance = self.snapshot(account_id).await.unwrap_or(Decimal::ZERO);
                tracing::warn!(
                    %account_id,
                    %balance,
                    required = %amount,
                    service = service_name,
                    "charge declined: insufficient funds"
                );
                Err(LedgerError::InsufficientFunds {
                    balance,
                    required: amount,
                })
            }
            Err(err) => {
                tracing::error!(
                    %account_id,
                    %amount,
                    service = service_name,
                    error = %err,
                    "charge failed"
                );
                Err(LedgerError::StoreUnavailable(err))
            }
        }
    }

    /// Offsetting credit for an earlier charge, issued by an administrator.
    pub async fn refund(
        &self,
        account_id: AccountId,
        amount: Decimal,
        service_name: &str,
        actor: AccountId,
        description: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        validate_amount(amount, self.limits.min_charge)?;

        let entry = NewLedgerEntry::refund(account_id, amount, service_name, actor, description);
        let recorded = self.store.credit(entry).await.map_err(|err| {
            tracing::error!(%account_id, %amount, %actor, error = %err, "refund failed");
            LedgerError::StoreUnavailable(err)
        })?;

        tracing::info!(
            %account_id,
            %amount,
            %actor,
            service = service_name,
            entry_id = recorded.id,
            "balance refunded"
        );
        Ok(recorded)
    }

    /// Most recent entries first. `limit` is clamped to the configured bounds.
    pub async fn transactions(&self, account_id: AccountId, limit: Option<i64>) -> Vec<LedgerEntry> {
        let limit = limit
            .unwrap_or(self.limits.default_history)
            .clamp(1, self.limits.max_history.max(1));

        self.store
            .entries(account_id, limit)
            .await
            .unwrap_or_else(|err| {
                tracing::error!(%account_id, error = %err, "failed to list transactions");
                Vec::new()
            })
    }

    /// Active service prices.
    pub async fn service_pricing(&self) -> Vec<ServicePricing> {
        self.store.service_pricing().await.unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to read service pricing");
            Vec::new()
        })
    }

    /// Catalog entry for one service; store faults propagate.
    pub(crate) async fn price_for(
        &self,
        service_name: &str,
    ) -> Result<Option<ServicePricing>, StoreError> {
        self.store.price_for(service_name).await
    }

    /// Every account with its balance, most recently updated first.
    pub async fn accounts_with_balance(&self) -> Vec<AccountBalance> {
        match self.store.accounts().await {
            Ok(accounts) => accounts
                .into_iter()
                .map(|account| AccountBalance {
                    account_id: account.account_id,
                    balance: self.converter.view(account.balance),
                    updated_at: account.updated_at,
                })
                .collect(),
            Err(err) => {
                tracing::error!(error = %err, "failed to list accounts");
                Vec::new()
            }
        }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    /// Checks `amount` against the rules `charge` applies, without charging.
    pub(crate) fn validate_charge(&self, amount: Decimal) -> Result<(), LedgerError> {
        validate_amount(amount, self.limits.min_charge)
    }
}

fn validate_amount(amount: Decimal, minimum: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    if amount < minimum {
        return Err(LedgerError::InvalidAmount(format!(
            "Amount must be at least {minimum}"
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(LedgerError::InvalidAmount(format!(
            "Amount must not exceed {MAX_AMOUNT}"
        )));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(LedgerError::InvalidAmount(format!(
            "Amount must have at most {AMOUNT_SCALE} decimal places"
        )));
    }
    Ok(())
}
