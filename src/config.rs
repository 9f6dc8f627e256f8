//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into a
//! type-safe struct. Currency settings here only affect how balances are
//! displayed; stored balances never change when they do.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    currency::{ConfigError, CurrencyConverter, CurrencyLabel, CurrencySettings},
    middleware::auth::CallerAuth,
    models::account::AccountId,
    services::balance_service::LedgerLimits,
};

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `CURRENCY_RATE` (optional): primary units per secondary unit, defaults to 10
/// - `CURRENCY_DECIMAL_PLACES` (optional): display precision, defaults to 2
/// - `CURRENCY_PRIMARY` / `CURRENCY_SECONDARY` (optional): codes, default RUB / BT
/// - `CURRENCY_SYMBOL_PRIMARY` / `CURRENCY_SYMBOL_SECONDARY` (optional)
/// - `MIN_DEPOSIT` / `MIN_CHARGE` (optional): minimum transactable amounts
/// - `TRANSACTIONS_DEFAULT_LIMIT` / `TRANSACTIONS_MAX_LIMIT` (optional)
/// - `ADMIN_IDS` (optional): comma-separated user ids allowed to deposit
/// - `API_KEY_HASHES` (optional): comma-separated SHA-256 hex digests of
///   service keys; with none configured every API request is rejected
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_rate")]
    pub currency_rate: Decimal,

    #[serde(default = "default_decimal_places")]
    pub currency_decimal_places: u32,

    #[serde(default = "default_primary")]
    pub currency_primary: String,

    #[serde(default = "default_secondary")]
    pub currency_secondary: String,

    #[serde(default = "default_symbol_primary")]
    pub currency_symbol_primary: String,

    #[serde(default = "default_symbol_secondary")]
    pub currency_symbol_secondary: String,

    #[serde(default = "default_min_deposit")]
    pub min_deposit: Decimal,

    #[serde(default = "default_min_charge")]
    pub min_charge: Decimal,

    #[serde(default = "default_history_limit")]
    pub transactions_default_limit: i64,

    #[serde(default = "default_history_max")]
    pub transactions_max_limit: i64,

    #[serde(default)]
    pub admin_ids: Vec<i64>,

    #[serde(default)]
    pub api_key_hashes: Vec<String>,
}

fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_rate() -> Decimal {
    Decimal::TEN
}

fn default_decimal_places() -> u32 {
    2
}

fn default_primary() -> String {
    "RUB".to_string()
}

fn default_secondary() -> String {
    "BT".to_string()
}

fn default_symbol_primary() -> String {
    "₽".to_string()
}

fn default_symbol_secondary() -> String {
    "💎".to_string()
}

fn default_min_deposit() -> Decimal {
    Decimal::ONE
}

fn default_min_charge() -> Decimal {
    Decimal::new(1, 2)
}

fn default_history_limit() -> i64 {
    50
}

fn default_history_max() -> i64 {
    500
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Loads an optional `.env` file first, then reads the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or values cannot
    /// be parsed into the expected types.
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are converted automatically: currency_rate -> CURRENCY_RATE
        envy::from_env::<Config>()
    }

    pub fn currency_settings(&self) -> CurrencySettings {
        CurrencySettings {
            rate: self.currency_rate,
            decimal_places: self.currency_decimal_places,
            primary: CurrencyLabel::new(&self.currency_primary, &self.currency_symbol_primary),
            secondary: CurrencyLabel::new(
                &self.currency_secondary,
                &self.currency_symbol_secondary,
            ),
        }
    }

    /// Validated converter for the configured currencies.
    pub fn currency_converter(&self) -> Result<CurrencyConverter, ConfigError> {
        CurrencyConverter::new(self.currency_settings())
    }

    pub fn ledger_limits(&self) -> LedgerLimits {
        LedgerLimits {
            min_deposit: self.min_deposit,
            min_charge: self.min_charge,
            default_history: self.transactions_default_limit,
            max_history: self.transactions_max_limit.max(1),
        }
    }

    pub fn caller_auth(&self) -> CallerAuth {
        CallerAuth::new(
            self.api_key_hashes.iter().cloned(),
            self.admin_ids.iter().copied().map(AccountId),
        )
    }
}
