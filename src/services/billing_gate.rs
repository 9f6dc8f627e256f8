//! Admission guard and settlement hook for metered operations.
//!
//! Billing a slow downstream operation is split into two explicit steps so
//! that no store transaction is ever held open while it runs:
//!
//! 1. [`BillingGate::admit`] - advisory balance check before the operation.
//!    Reserves nothing; on success it hands back an immutable
//!    [`BillingIntent`] for the caller to carry alongside the request.
//! 2. [`BillingGate::settle`] - after the operation finished. Charges only
//!    if the operation succeeded, through [`BalanceService::charge`], which
//!    re-validates sufficiency atomically instead of trusting the intent.
//!
//! Between the two steps another request may spend the balance. Settlement
//! then reports a [`Settlement::Discrepancy`] and the already-delivered
//! outcome stands: billing is best-effort and post-paid.

use rust_decimal::Decimal;

use crate::{
    models::{account::AccountId, ledger_entry::LedgerEntry},
    services::balance_service::{BalanceService, LedgerError},
};

/// How a metered operation is priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Price {
    /// Price fixed by the route itself.
    Fixed(Decimal),
    /// Price read from the service pricing catalog at admission time.
    Catalog,
}

/// What settlement should charge. Produced only by [`BillingGate::admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingIntent {
    pub service_name: String,
    pub amount: Decimal,
    pub account_id: AccountId,
}

/// Why a metered operation was not allowed to start.
///
/// Every variant denies: missing prices and store faults fail closed
/// instead of granting unbilled access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionDenied {
    #[error("insufficient funds for {service_name}: balance {balance}, required {required}")]
    InsufficientFunds {
        balance: Decimal,
        required: Decimal,
        service_name: String,
    },

    #[error("no active price configured for {0}")]
    Unpriced(String),

    #[error("ledger store unavailable")]
    Unavailable,
}

/// Final state of the wrapped operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

/// Result of settling one intent.
#[derive(Debug)]
pub enum Settlement {
    Charged(LedgerEntry),
    /// The operation failed; nothing was charged.
    Skipped,
    /// The balance no longer covered the intent when settlement ran.
    Discrepancy { balance: Decimal, required: Decimal },
    /// The charge could not be attempted or committed.
    Failed,
}

impl Settlement {
    pub fn is_charged(&self) -> bool {
        matches!(self, Settlement::Charged(_))
    }
}

/// Two-step billing protocol over a [`BalanceService`].
#[derive(Clone)]
pub struct BillingGate {
    ledger: BalanceService,
}

impl BillingGate {
    pub fn new(ledger: BalanceService) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &BalanceService {
        &self.ledger
    }

    /// Fail-fast check that `account_id` can currently pay for `service_name`.
    pub async fn admit(
        &self,
        account_id: AccountId,
        service_name: &str,
        price: &Price,
    ) -> Result<BillingIntent, AdmissionDenied> {
        let amount = self.resolve_price(service_name, price).await?;

        // A price settlement could never charge would deliver the operation for free
        if let Err(err) = self.ledger.validate_charge(amount) {
            tracing::error!(
                %account_id,
                service = service_name,
                price = %amount,
                error = %err,
                "configured price is not chargeable, denying"
            );
            return Err(AdmissionDenied::Unpriced(service_name.to_string()));
        }

        let balance = self.ledger.snapshot(account_id).await.map_err(|err| {
            tracing::error!(%account_id, service = service_name, error = %err, "admission balance read failed");
            AdmissionDenied::Unavailable
        })?;

        if balance < amount {
            tracing::warn!(
                %account_id,
                %balance,
                required = %amount,
                service = service_name,
                "admission denied: insufficient funds"
            );
            return Err(AdmissionDenied::InsufficientFunds {
                balance,
                required: amount,
                service_name: service_name.to_string(),
            });
        }

        Ok(BillingIntent {
            service_name: service_name.to_string(),
            amount,
            account_id,
        })
    }

    /// Charge `intent` if the operation succeeded. Never retries.
    pub async fn settle(&self, intent: &BillingIntent, outcome: Outcome) -> Settlement {
        if outcome == Outcome::Failed {
            tracing::debug!(
                account_id = %intent.account_id,
                service = %intent.service_name,
                "operation failed, settlement skipped"
            );
            return Settlement::Skipped;
        }

        let description = format!("Automatic charge for {}", intent.service_name);
        match self
            .ledger
            .charge(intent.account_id, intent.amount, &intent.service_name, &description)
            .await
        {
            Ok(entry) => Settlement::Charged(entry),
            Err(LedgerError::InsufficientFunds { balance, required }) => {
                tracing::error!(
                    account_id = %intent.account_id,
                    %balance,
                    %required,
                    service = %intent.service_name,
                    "settlement discrepancy: operation delivered but balance no longer covers it"
                );
                Settlement::Discrepancy { balance, required }
            }
            Err(err) => {
                tracing::error!(
                    account_id = %intent.account_id,
                    amount = %intent.amount,
                    service = %intent.service_name,
                    error = %err,
                    "settlement failed"
                );
                Settlement::Failed
            }
        }
    }

    async fn resolve_price(&self, service_name: &str, price: &Price) -> Result<Decimal, AdmissionDenied> {
        match price {
            Price::Fixed(amount) => Ok(*amount),
            Price::Catalog => match self.ledger.price_for(service_name).await {
                Ok(Some(pricing)) if pricing.active => Ok(pricing.price),
                Ok(_) => {
                    tracing::error!(service = service_name, "no active price configured, denying");
                    Err(AdmissionDenied::Unpriced(service_name.to_string()))
                }
                Err(err) => {
                    tracing::error!(service = service_name, error = %err, "price lookup failed, denying");
                    Err(AdmissionDenied::Unavailable)
                }
            },
        }
    }
}
