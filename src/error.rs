//! Error types and HTTP error response handling.
//!
//! This module defines the HTTP-facing error type and how ledger, gate and
//! store errors are converted into responses with appropriate status codes
//! and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::{
    services::{balance_service::LedgerError, billing_gate::AdmissionDenied},
    store::StoreError,
};

/// Where clients are sent to top up after a decline.
pub const TOPUP_URL: &str = "/billing/topup";

/// Context attached to a `payment_required` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequired {
    pub balance: Decimal,
    pub required: Decimal,
    pub service_name: Option<String>,
    pub topup_url: &'static str,
}

impl PaymentRequired {
    pub fn new(balance: Decimal, required: Decimal, service_name: Option<String>) -> Self {
        Self {
            balance,
            required,
            service_name,
            topup_url: TOPUP_URL,
        }
    }
}

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Store Errors**: infrastructure faults, details hidden from clients
/// - **Authentication Errors**: invalid service key or missing caller identity
/// - **Business Declines**: insufficient funds (402)
/// - **Configuration Errors**: metered route without a usable price (503)
/// - **Validation Errors**: invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Ledger store failed.
    ///
    /// Returns HTTP 500 Internal Server Error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Service key is missing or not recognised.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// The upstream gateway did not supply a usable caller id.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Missing caller identity")]
    MissingCaller,

    /// Caller is not an administrator.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Administrator access required")]
    Forbidden,

    /// Balance does not cover the requested amount.
    ///
    /// Returns HTTP 402 Payment Required.
    #[error("Insufficient funds")]
    PaymentRequired(PaymentRequired),

    /// Metered route cannot be priced or checked; access is denied.
    ///
    /// Returns HTTP 503 Service Unavailable.
    #[error("Pricing unavailable for {0}")]
    PricingUnavailable(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidAmount(msg) => AppError::InvalidRequest(msg),
            LedgerError::InsufficientFunds { balance, required } => {
                AppError::PaymentRequired(PaymentRequired::new(balance, required, None))
            }
            LedgerError::StoreUnavailable(store) => AppError::Store(store),
        }
    }
}

impl From<AdmissionDenied> for AppError {
    fn from(denied: AdmissionDenied) -> Self {
        match denied {
            AdmissionDenied::InsufficientFunds {
                balance,
                required,
                service_name,
            } => AppError::PaymentRequired(PaymentRequired::new(
                balance,
                required,
                Some(service_name),
            )),
            AdmissionDenied::Unpriced(service) => AppError::PricingUnavailable(service),
            AdmissionDenied::Unavailable => {
                AppError::PricingUnavailable("ledger unavailable".to_string())
            }
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "payment_required",
///     "message": "Insufficient funds",
///     "details": {
///       "balance": "3.00",
///       "required": "5.00",
///       "service_name": "ai_request",
///       "topup_url": "/billing/topup"
///     }
///   }
/// }
/// ```
///
/// `details` is present only for `payment_required`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::InvalidApiKey | AppError::MissingCaller => {
                (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string())
            }
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            AppError::PaymentRequired(_) => (
                StatusCode::PAYMENT_REQUIRED,
                "payment_required",
                self.to_string(),
            ),
            AppError::PricingUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "pricing_unavailable",
                self.to_string(),
            ),
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Store(err) => {
                tracing::error!(error = %err, "request failed on store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = match &self {
            AppError::PaymentRequired(details) => json!({
                "error": {
                    "code": code,
                    "message": message,
                    "details": details
                }
            }),
            _ => json!({
                "error": {
                    "code": code,
                    "message": message
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}
