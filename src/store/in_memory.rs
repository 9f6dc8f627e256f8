use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use super::{LedgerStore, StoreError};
use crate::models::{
    account::{Account, AccountId},
    ledger_entry::{LedgerEntry, NewLedgerEntry},
    pricing::{ServicePricing, default_catalog},
};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    entries: Vec<LedgerEntry>,
    pricing: Vec<ServicePricing>,
}

impl State {
    fn append(&mut self, entry: NewLedgerEntry) -> LedgerEntry {
        let recorded = LedgerEntry {
            id: self.entries.len() as i64 + 1,
            account_id: entry.account_id,
            amount: entry.amount,
            kind: entry.kind,
            service_name: entry.service_name,
            description: entry.description,
            admin_actor: entry.admin_actor,
            created_at: Utc::now(),
        };
        self.entries.push(recorded.clone());
        recorded
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A single mutex guards accounts and entries, so
/// every check-update-append sequence runs inside one critical section.
#[derive(Debug)]
pub struct InMemoryLedgerStore {
    state: Mutex<State>,
}

impl InMemoryLedgerStore {
    /// Empty store seeded with the default pricing catalog.
    pub fn new() -> Self {
        Self::with_pricing(default_catalog())
    }

    pub fn with_pricing(pricing: Vec<ServicePricing>) -> Self {
        Self {
            state: Mutex::new(State {
                pricing,
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("ledger state lock poisoned".to_string()))
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn ensure_account(&self, account_id: AccountId) -> Result<Account, StoreError> {
        let mut state = self.lock()?;
        let account = state.accounts.entry(account_id).or_insert_with(|| Account {
            account_id,
            balance: Decimal::ZERO,
            updated_at: Utc::now(),
        });
        Ok(account.clone())
    }

    async fn balance_of(&self, account_id: AccountId) -> Result<Option<Decimal>, StoreError> {
        let state = self.lock()?;
        Ok(state.accounts.get(&account_id).map(|a| a.balance))
    }

    async fn credit(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let account = state
            .accounts
            .entry(entry.account_id)
            .or_insert_with(|| Account {
                account_id: entry.account_id,
                balance: Decimal::ZERO,
                updated_at: now,
            });
        account.balance = account
            .balance
            .checked_add(entry.amount)
            .ok_or(StoreError::BalanceOverflow(entry.account_id))?;
        account.updated_at = now;
        Ok(state.append(entry))
    }

    async fn debit_if_sufficient(
        &self,
        entry: NewLedgerEntry,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let mut state = self.lock()?;
        let required = entry.magnitude();
        let Some(account) = state.accounts.get_mut(&entry.account_id) else {
            return Ok(None);
        };
        if account.balance < required {
            return Ok(None);
        }
        account.balance -= required;
        account.updated_at = Utc::now();
        Ok(Some(state.append(entry)))
    }

    async fn entries(
        &self,
        account_id: AccountId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.lock()?;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|e| e.account_id == account_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn service_pricing(&self) -> Result<Vec<ServicePricing>, StoreError> {
        let state = self.lock()?;
        let mut active: Vec<ServicePricing> =
            state.pricing.iter().filter(|p| p.active).cloned().collect();
        active.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        Ok(active)
    }

    async fn price_for(&self, service_name: &str) -> Result<Option<ServicePricing>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .pricing
            .iter()
            .find(|p| p.service_name == service_name)
            .cloned())
    }

    async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        let state = self.lock()?;
        let mut accounts: Vec<Account> = state.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(a.account_id.cmp(&b.account_id))
        });
        Ok(accounts)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}
