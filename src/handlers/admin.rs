//! Administrative billing handlers.
//!
//! Routed behind `require_admin`; the acting administrator recorded on
//! each entry is the authenticated caller.

use axum::{Extension, Json, extract::State};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        account::AccountBalance,
        ledger_entry::{DepositRequest, MutationResponse, RefundRequest},
    },
    services::balance_service::BalanceService,
};

/// Top up an account.
///
/// # Endpoint
///
/// `POST /api/v1/billing/deposit`
///
/// # Request Body
///
/// ```json
/// {
///   "account_id": 42,
///   "amount": "100.00",
///   "description": "topup"
/// }
/// ```
///
/// Creates the account if it has never been seen. Identical requests are
/// applied twice.
pub async fn deposit(
    State(ledger): State<BalanceService>,
    Extension(admin): Extension<AuthContext>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<MutationResponse>, AppError> {
    let description = request
        .description
        .unwrap_or_else(|| "Deposit by administrator".to_string());

    let entry = ledger
        .deposit(
            request.account_id,
            request.amount,
            admin.account_id,
            &description,
        )
        .await?;

    Ok(Json(entry.into()))
}

/// Credit back an earlier charge.
///
/// # Endpoint
///
/// `POST /api/v1/billing/refund`
pub async fn refund(
    State(ledger): State<BalanceService>,
    Extension(admin): Extension<AuthContext>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<MutationResponse>, AppError> {
    let service_name = request.service_name.trim();
    if service_name.is_empty() {
        return Err(AppError::InvalidRequest(
            "service_name must not be empty".to_string(),
        ));
    }

    let description = request
        .description
        .unwrap_or_else(|| format!("Refund for {service_name}"));

    let entry = ledger
        .refund(
            request.account_id,
            request.amount,
            service_name,
            admin.account_id,
            &description,
        )
        .await?;

    Ok(Json(entry.into()))
}

/// Every account with its balance, most recently updated first.
///
/// # Endpoint
///
/// `GET /api/v1/billing/admin/accounts`
pub async fn list_accounts(State(ledger): State<BalanceService>) -> Json<Vec<AccountBalance>> {
    Json(ledger.accounts_with_balance().await)
}
