//! Concurrent charge stress tests against the in-memory store.
//!
//! These tests verify that:
//! - N concurrent charges against one balance succeed for exactly the
//!   subset that fits, whatever the interleaving
//! - The balance never goes negative
//! - The balance always equals the sum of the account's entries

use std::sync::Arc;

use billing_ledger_server::{
    currency::CurrencyConverter,
    models::account::AccountId,
    services::balance_service::{BalanceService, LedgerError, LedgerLimits},
    store::InMemoryLedgerStore,
};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

const ADMIN: AccountId = AccountId(1000);

fn ledger() -> BalanceService {
    BalanceService::new(
        Arc::new(InMemoryLedgerStore::new()),
        CurrencyConverter::default(),
        LedgerLimits {
            max_history: 10_000,
            ..LedgerLimits::default()
        },
    )
}

async fn entry_sum(ledger: &BalanceService, account_id: AccountId) -> Decimal {
    ledger
        .transactions(account_id, Some(10_000))
        .await
        .iter()
        .map(|e| e.amount)
        .sum()
}

/// Spawns one charge per amount, all released at once by a barrier.
async fn charge_concurrently(
    ledger: &BalanceService,
    account_id: AccountId,
    amounts: Vec<Decimal>,
) -> Vec<(Decimal, Result<(), LedgerError>)> {
    let barrier = Arc::new(Barrier::new(amounts.len()));

    let handles = amounts.into_iter().enumerate().map(|(i, amount)| {
        let ledger = ledger.clone();
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            let result = ledger
                .charge(account_id, amount, "ai_request", &format!("worker {i}"))
                .await
                .map(|_| ());
            (amount, result)
        })
    });

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("charge task panicked"))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn exactly_the_fitting_charges_succeed() {
    let ledger = ledger();
    let user = AccountId(1);
    ledger.deposit(user, dec!(100), ADMIN, "topup").await.unwrap();

    const WORKERS: usize = 40;
    let results = charge_concurrently(&ledger, user, vec![dec!(10); WORKERS]).await;

    let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
    let declined = results
        .iter()
        .filter(|(_, r)| matches!(r, Err(LedgerError::InsufficientFunds { .. })))
        .count();

    assert_eq!(succeeded, 10);
    assert_eq!(declined, WORKERS - 10);
    assert_eq!(ledger.balance(user).await.amount_primary, Decimal::ZERO);
    assert_eq!(entry_sum(&ledger, user).await, Decimal::ZERO);
    // One deposit plus ten charges; declines write nothing
    assert_eq!(ledger.transactions(user, Some(10_000)).await.len(), 11);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn mixed_amounts_never_overdraw() {
    let ledger = ledger();
    let user = AccountId(2);
    ledger.deposit(user, dec!(100), ADMIN, "topup").await.unwrap();

    let amounts: Vec<Decimal> = (0..30)
        .map(|i| [dec!(7.50), dec!(12), dec!(30), dec!(0.25)][i % 4])
        .collect();
    let results = charge_concurrently(&ledger, user, amounts).await;

    let spent: Decimal = results
        .iter()
        .filter(|(_, r)| r.is_ok())
        .map(|(amount, _)| *amount)
        .sum();
    let remaining = ledger.balance(user).await.amount_primary;

    assert!(remaining >= Decimal::ZERO);
    assert_eq!(remaining, dec!(100) - spent);
    assert_eq!(entry_sum(&ledger, user).await, remaining);

    // Every declined charge was declined because it did not fit at the end
    for (amount, result) in &results {
        if result.is_err() {
            assert!(remaining < *amount, "{amount} was declined but fits in {remaining}");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn deposits_interleaved_with_charges_keep_the_sum() {
    let ledger = ledger();
    let user = AccountId(3);
    ledger.deposit(user, dec!(20), ADMIN, "topup").await.unwrap();

    const WORKERS: usize = 50;
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles = (0..WORKERS).map(|i| {
        let ledger = ledger.clone();
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            if i % 5 == 0 {
                ledger
                    .deposit(user, dec!(10), ADMIN, "topup")
                    .await
                    .map(|_| ())
            } else {
                ledger
                    .charge(user, dec!(3), "ai_request", "call")
                    .await
                    .map(|_| ())
            }
        })
    });

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let charged = results
        .iter()
        .enumerate()
        .filter(|(i, r)| i % 5 != 0 && r.is_ok())
        .count();

    let balance = ledger.balance(user).await.amount_primary;
    let expected = dec!(20) + dec!(10) * Decimal::from(WORKERS / 5)
        - dec!(3) * Decimal::from(charged);

    assert!(balance >= Decimal::ZERO);
    assert_eq!(balance, expected);
    assert_eq!(entry_sum(&ledger, user).await, balance);
}
