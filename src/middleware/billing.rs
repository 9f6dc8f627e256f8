//! Billing middleware for metered routes.
//!
//! Wraps [`BillingGate`] for axum:
//! - `require_balance` admits the request or answers 402 / 503
//! - `charge_after_success` settles the admitted intent once the handler
//!   has produced a 2xx response
//! - `attach_balance` hands the caller's balance to handlers without ever
//!   rejecting
//!
//! Use [`metered`] to apply the first two in the right order.

use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::{Request, State},
    middleware::{Next, from_fn_with_state},
    response::Response,
};
use rust_decimal::Decimal;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    services::{
        balance_service::BalanceService,
        billing_gate::{BillingGate, BillingIntent, Outcome, Price, Settlement},
    },
};

/// Billing configuration of one metered route.
#[derive(Clone)]
pub struct MeteredRoute {
    pub gate: BillingGate,
    pub service_name: Arc<str>,
    pub price: Price,
}

impl MeteredRoute {
    /// Route billed a fixed `amount` per successful call.
    pub fn fixed(gate: BillingGate, service_name: &str, amount: Decimal) -> Self {
        Self {
            gate,
            service_name: Arc::from(service_name),
            price: Price::Fixed(amount),
        }
    }

    /// Route billed at the catalog price of `service_name`.
    pub fn catalog(gate: BillingGate, service_name: &str) -> Self {
        Self {
            gate,
            service_name: Arc::from(service_name),
            price: Price::Catalog,
        }
    }
}

/// Admission guard.
///
/// Must run inside `auth_middleware`. On success the [`BillingIntent`] is
/// inserted into the request extensions for `charge_after_success`.
pub async fn require_balance(
    State(route): State<MeteredRoute>,
    Extension(caller): Extension<AuthContext>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let intent = route
        .gate
        .admit(caller.account_id, &route.service_name, &route.price)
        .await?;

    request.extensions_mut().insert(intent);
    Ok(next.run(request).await)
}

/// Settlement hook.
///
/// Runs the handler, then charges the admitted intent if the response is
/// 2xx. The response is returned unchanged whatever settlement reports.
pub async fn charge_after_success(
    State(gate): State<BillingGate>,
    request: Request,
    next: Next,
) -> Response {
    let Some(intent) = request.extensions().get::<BillingIntent>().cloned() else {
        tracing::warn!(uri = %request.uri(), "metered route reached without a billing intent");
        return next.run(request).await;
    };

    let response = next.run(request).await;

    let outcome = if response.status().is_success() {
        Outcome::Succeeded
    } else {
        Outcome::Failed
    };

    if let Settlement::Charged(entry) = gate.settle(&intent, outcome).await {
        tracing::info!(
            account_id = %intent.account_id,
            amount = %intent.amount,
            service = %intent.service_name,
            entry_id = entry.id,
            "metered call charged"
        );
    }

    response
}

/// Layers admission and settlement onto every route of `router`.
///
/// `require_balance` ends up outermost, so settlement only ever sees
/// admitted requests.
pub fn metered<S>(router: Router<S>, route: MeteredRoute) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .route_layer(from_fn_with_state(route.gate.clone(), charge_after_success))
        .route_layer(from_fn_with_state(route, require_balance))
}

/// Attaches the caller's [`DualCurrencyView`](crate::currency::DualCurrencyView)
/// to the request, if a caller is known. Never rejects.
pub async fn attach_balance(
    State(ledger): State<BalanceService>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(caller) = request.extensions().get::<AuthContext>().cloned() {
        let balance = ledger.balance(caller.account_id).await;
        request.extensions_mut().insert(balance);
    }

    next.run(request).await
}
