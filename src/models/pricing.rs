//! Service pricing catalog.
//!
//! Prices are owned by configuration (seeded by migration); the ledger only
//! reads them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Represents a `service_pricing` row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct ServicePricing {
    /// Name metered routes bill under (e.g. `ai_request`)
    pub service_name: String,

    /// Unit the price applies to (`request`, `day`, `task`)
    pub unit_type: String,

    /// Price per unit in the primary currency
    pub price: Decimal,

    /// Inactive entries are hidden from the catalog and cannot be billed
    pub active: bool,
}

impl ServicePricing {
    pub fn new(service_name: &str, unit_type: &str, price: Decimal) -> Self {
        Self {
            service_name: service_name.to_string(),
            unit_type: unit_type.to_string(),
            price,
            active: true,
        }
    }
}

/// Catalog seeded into fresh databases.
///
/// Kept in sync with `migrations/20250101000001_create_ledger.sql`.
pub fn default_catalog() -> Vec<ServicePricing> {
    vec![
        ServicePricing::new("ai_request", "request", Decimal::new(500, 2)),
        ServicePricing::new("ozon_daily", "day", Decimal::new(5000, 2)),
        ServicePricing::new("ozon_automation", "task", Decimal::new(1000, 2)),
    ]
}
