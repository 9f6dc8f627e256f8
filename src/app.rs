//! HTTP router assembly.
//!
//! Shared by the binary and the integration tests so both serve exactly
//! the same routes and middleware stack.

use axum::{
    Router,
    extract::FromRef,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers,
    middleware::{
        auth::{CallerAuth, auth_middleware, require_admin},
        billing::attach_balance,
    },
    services::{balance_service::BalanceService, billing_gate::BillingGate},
};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub ledger: BalanceService,
    pub auth: CallerAuth,
}

impl AppState {
    pub fn new(ledger: BalanceService, auth: CallerAuth) -> Self {
        Self { ledger, auth }
    }

    /// Billing gate over the shared ledger, for metered routes.
    pub fn gate(&self) -> BillingGate {
        BillingGate::new(self.ledger.clone())
    }
}

impl FromRef<AppState> for BalanceService {
    fn from_ref(state: &AppState) -> Self {
        state.ledger.clone()
    }
}

impl FromRef<AppState> for CallerAuth {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Router with the ledger's own endpoints.
pub fn build_app(state: AppState) -> Router {
    build_app_with(state, Router::new())
}

/// Router with the ledger's own endpoints plus `metered` routes.
///
/// `metered` routes are placed behind caller authentication; they are
/// expected to carry their billing layers already (see
/// [`crate::middleware::billing::metered`]).
pub fn build_app_with(state: AppState, metered: Router<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/api/v1/billing/deposit", post(handlers::admin::deposit))
        .route("/api/v1/billing/refund", post(handlers::admin::refund))
        .route(
            "/api/v1/billing/admin/accounts",
            get(handlers::admin::list_accounts),
        )
        .route_layer(from_fn(require_admin));

    let history_routes = Router::new()
        .route(
            "/api/v1/billing/transactions",
            get(handlers::billing::list_transactions),
        )
        .route_layer(from_fn_with_state(state.ledger.clone(), attach_balance));

    // Everything in this group requires the gateway key and a caller id
    let authenticated_routes = Router::new()
        .route("/api/v1/billing/balance", get(handlers::billing::get_balance))
        .route("/api/v1/billing/charge", post(handlers::billing::charge))
        .merge(history_routes)
        .merge(admin_routes)
        .merge(metered)
        .route_layer(from_fn_with_state(state.auth.clone(), auth_middleware));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/billing/services", get(handlers::billing::services))
        .merge(authenticated_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
