//! Postgres-backed ledger store.
//!
//! Correctness rests entirely on Postgres:
//!
//! - Charges use a single conditional statement,
//!   `UPDATE accounts SET balance = balance - $1 WHERE account_id = $2 AND balance >= $1`.
//!   Concurrent charges against one account serialize on the row lock and
//!   the losers see zero affected rows. No application-level lock exists.
//! - The balance update and the `ledger_entries` insert share one
//!   transaction; a failure between them rolls both back.
//! - `CHECK (balance >= 0)` backs the invariant at the schema level.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use super::{LedgerStore, StoreError};
use crate::{
    db::DbPool,
    models::{
        account::{Account, AccountId},
        ledger_entry::{LedgerEntry, NewLedgerEntry},
        pricing::ServicePricing,
    },
};

/// Ledger store over a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: DbPool,
}

impl PgLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Append one row to `ledger_entries` inside an open transaction.
async fn insert_entry(
    tx: &mut Transaction<'_, Postgres>,
    entry: &NewLedgerEntry,
) -> Result<LedgerEntry, sqlx::Error> {
    sqlx::query_as::<_, LedgerEntry>(
        r#"
        INSERT INTO ledger_entries (
            account_id,
            amount,
            kind,
            service_name,
            description,
            admin_actor
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, account_id, amount, kind, service_name, description, admin_actor, created_at
        "#,
    )
    .bind(entry.account_id)
    .bind(entry.amount)
    .bind(entry.kind)
    .bind(&entry.service_name)
    .bind(&entry.description)
    .bind(entry.admin_actor)
    .fetch_one(&mut **tx)
    .await
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn ensure_account(&self, account_id: AccountId) -> Result<Account, StoreError> {
        // Conditional insert: a no-op when another request created the row first
        sqlx::query("INSERT INTO accounts (account_id) VALUES ($1) ON CONFLICT (account_id) DO NOTHING")
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        let account = sqlx::query_as::<_, Account>(
            "SELECT account_id, balance, updated_at FROM accounts WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    async fn balance_of(&self, account_id: AccountId) -> Result<Option<Decimal>, StoreError> {
        let balance = sqlx::query_scalar("SELECT balance FROM accounts WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(balance)
    }

    async fn credit(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Upsert so a first deposit creates the account and the entry together
        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, balance)
            VALUES ($1, $2)
            ON CONFLICT (account_id) DO UPDATE
            SET balance = accounts.balance + EXCLUDED.balance,
                updated_at = NOW()
            "#,
        )
        .bind(entry.account_id)
        .bind(entry.amount)
        .execute(&mut *tx)
        .await?;

        let recorded = insert_entry(&mut tx, &entry).await?;

        tx.commit().await?;

        Ok(recorded)
    }

    async fn debit_if_sufficient(
        &self,
        entry: NewLedgerEntry,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Sufficiency is checked and enforced by the same statement
        let matched = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance - $1,
                updated_at = NOW()
            WHERE account_id = $2
              AND balance >= $1
            "#,
        )
        .bind(entry.magnitude())
        .bind(entry.account_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if matched == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let recorded = insert_entry(&mut tx, &entry).await?;

        tx.commit().await?;

        Ok(Some(recorded))
    }

    async fn entries(
        &self,
        account_id: AccountId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, account_id, amount, kind, service_name, description, admin_actor, created_at
            FROM ledger_entries
            WHERE account_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn service_pricing(&self) -> Result<Vec<ServicePricing>, StoreError> {
        let pricing = sqlx::query_as::<_, ServicePricing>(
            r#"
            SELECT service_name, unit_type, price, active
            FROM service_pricing
            WHERE active
            ORDER BY service_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(pricing)
    }

    async fn price_for(&self, service_name: &str) -> Result<Option<ServicePricing>, StoreError> {
        let pricing = sqlx::query_as::<_, ServicePricing>(
            "SELECT service_name, unit_type, price, active FROM service_pricing WHERE service_name = $1",
        )
        .bind(service_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pricing)
    }

    async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, balance, updated_at
            FROM accounts
            ORDER BY updated_at DESC, account_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
