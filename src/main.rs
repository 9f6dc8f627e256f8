//! Billing Ledger - Main Application Entry Point
//!
//! REST API server holding prepaid balances for users of the platform.
//! Balances are kept in the primary currency and shown alongside a
//! secondary display currency. Paid services are charged through the
//! ledger, either directly or via metered routes.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: gateway service key with SHA-256 hashing plus
//!   forwarded caller id
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Validate currency settings
//! 3. Create database connection pool
//! 4. Run database migrations
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

use std::sync::Arc;

use billing_ledger_server::{
    app::{AppState, build_app},
    config::Config,
    db,
    services::balance_service::BalanceService,
    store::PgLedgerStore,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let converter = config.currency_converter()?;
    tracing::info!(
        rate = %config.currency_rate,
        primary = %config.currency_primary,
        secondary = %config.currency_secondary,
        "Configuration loaded"
    );

    let auth = config.caller_auth();
    if !auth.has_keys() {
        tracing::warn!("API_KEY_HASHES is empty, every authenticated request will be rejected");
    }

    // Create database pool
    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let ledger = BalanceService::new(
        Arc::new(PgLedgerStore::new(pool)),
        converter,
        config.ledger_limits(),
    );

    let app = build_app(AppState::new(ledger, auth));

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
