//! Billing HTTP handlers for the calling account.
//!
//! This module implements the caller-facing billing endpoints:
//! - GET /api/v1/billing/balance - Balance in both currencies
//! - GET /api/v1/billing/transactions - Ledger history, newest first
//! - POST /api/v1/billing/charge - Pay for a service
//! - GET /api/v1/billing/services - Active service prices (public)

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Serialize;

use crate::{
    currency::DualCurrencyView,
    error::{AppError, PaymentRequired},
    middleware::auth::AuthContext,
    models::{
        account::AccountId,
        ledger_entry::{ChargeRequest, MutationResponse, TransactionResponse, TransactionsQuery},
        pricing::ServicePricing,
    },
    services::balance_service::{BalanceService, LedgerError},
};

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: AccountId,
    pub balance: DualCurrencyView,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    /// Balance at the time of the request, when attached by middleware
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<DualCurrencyView>,
    pub transactions: Vec<TransactionResponse>,
}

/// Get the caller's balance.
///
/// # Endpoint
///
/// `GET /api/v1/billing/balance`
///
/// # Response (200 OK)
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
///   }
/// }
/// ```
///
/// A first request creates the account with a zero balance.
pub async fn get_balance(
    State(ledger): State<BalanceService>,
    Extension(caller): Extension<AuthContext>,
) -> Json<BalanceResponse> {
    let balance = ledger.balance(caller.account_id).await;

    Json(BalanceResponse {
        account_id: caller.account_id,
        balance,
    })
}

/// List the caller's ledger entries, newest first.
///
/// # Endpoint
///
/// `GET /api/v1/billing/transactions?limit=50`
///
/// `limit` is clamped to the configured maximum.
pub async fn list_transactions(
    State(ledger): State<BalanceService>,
    Extension(caller): Extension<AuthContext>,
    balance: Option<Extension<DualCurrencyView>>,
    Query(query): Query<TransactionsQuery>,
) -> Json<TransactionsResponse> {
    let transactions = ledger
        .transactions(caller.account_id, query.limit)
        .await
        .into_iter()
        .map(TransactionResponse::from)
        .collect();

    Json(TransactionsResponse {
        balance: balance.map(|Extension(view)| view),
        transactions,
    })
}

/// Charge the caller for a service.
///
/// # Endpoint
///
/// `POST /api/v1/billing/charge`
///
/// # Request Body
///
/// ```json
/// {
///   "amount": "30.00",
///   "service_name": "ai_request",
///   "description": "gpt call"
/// }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: `{"ok": true, "transaction": {...}}`
/// - **Error (400)**: Invalid amount or empty service name
/// - **Error (402)**: Balance does not cover the amount; nothing was written
///
/// Not idempotent: repeating the request charges again.
pub async fn charge(
    State(ledger): State<BalanceService>,
    Extension(caller): Extension<AuthContext>,
    Json(request): Json<ChargeRequest>,
) -> Result<Json<MutationResponse>, AppError> {
    let service_name = request.service_name.trim();
    if service_name.is_empty() {
        return Err(AppError::InvalidRequest(
            "service_name must not be empty".to_string(),
        ));
    }

    let description = request
        .description
        .unwrap_or_else(|| format!("Charge for {service_name}"));

    let entry = ledger
        .charge(caller.account_id, request.amount, service_name, &description)
        .await
        .map_err(|err| match err {
            LedgerError::InsufficientFunds { balance, required } => AppError::PaymentRequired(
                PaymentRequired::new(balance, required, Some(service_name.to_string())),
            ),
            other => other.into(),
        })?;

    Ok(Json(entry.into()))
}

/// Active service prices. Public.
pub async fn services(State(ledger): State<BalanceService>) -> Json<Vec<ServicePricing>> {
    Json(ledger.service_pricing().await)
}
