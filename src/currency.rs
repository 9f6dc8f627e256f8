//! Fixed-rate conversion between the persisted (primary) currency and the
//! display-only (secondary) currency.
//!
//! Balances are only ever stored in the primary currency. The secondary
//! amount is recomputed on every read, so changing the rate never requires
//! a data migration.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Upper bound for display precision.
const MAX_DECIMAL_PLACES: u32 = 8;

/// Invalid currency configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("exchange rate must be positive, got {0}")]
    NonPositiveRate(Decimal),

    #[error("decimal places must be at most 8, got {0}")]
    TooManyDecimalPlaces(u32),
}

/// Code and symbol of one currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyLabel {
    pub code: String,
    pub symbol: String,
}

impl CurrencyLabel {
    pub fn new(code: &str, symbol: &str) -> Self {
        Self {
            code: code.to_string(),
            symbol: symbol.to_string(),
        }
    }
}

/// Which side of the conversion an amount is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySide {
    Primary,
    Secondary,
}

/// Fixed conversion settings supplied by configuration.
///
/// `rate` is the number of primary units per secondary unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencySettings {
    pub rate: Decimal,
    pub decimal_places: u32,
    pub primary: CurrencyLabel,
    pub secondary: CurrencyLabel,
}

impl Default for CurrencySettings {
    fn default() -> Self {
        Self {
            rate: Decimal::TEN,
            decimal_places: 2,
            primary: CurrencyLabel::new("RUB", "₽"),
            secondary: CurrencyLabel::new("BT", "💎"),
        }
    }
}

/// Balance rendered in both currencies. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DualCurrencyView {
    pub amount_primary: Decimal,
    pub amount_secondary: Decimal,
    pub currency_primary: String,
    pub currency_secondary: String,
    pub symbol_primary: String,
    pub symbol_secondary: String,
}

/// Stateless converter built from validated [`CurrencySettings`].
#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    settings: CurrencySettings,
}

impl CurrencyConverter {
    pub fn new(settings: CurrencySettings) -> Result<Self, ConfigError> {
        if settings.rate <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveRate(settings.rate));
        }
        if settings.decimal_places > MAX_DECIMAL_PLACES {
            return Err(ConfigError::TooManyDecimalPlaces(settings.decimal_places));
        }
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &CurrencySettings {
        &self.settings
    }

    /// `round(amount / rate, decimal_places)`
    pub fn to_secondary(&self, amount: Decimal) -> Decimal {
        self.round(amount / self.settings.rate)
    }

    /// `round(amount * rate, decimal_places)`
    pub fn to_primary(&self, amount: Decimal) -> Decimal {
        self.round(amount * self.settings.rate)
    }

    /// Builds the dual-currency view of a primary amount.
    pub fn view(&self, amount_primary: Decimal) -> DualCurrencyView {
        DualCurrencyView {
            amount_primary: self.round(amount_primary),
            amount_secondary: self.to_secondary(amount_primary),
            currency_primary: self.settings.primary.code.clone(),
            currency_secondary: self.settings.secondary.code.clone(),
            symbol_primary: self.settings.primary.symbol.clone(),
            symbol_secondary: self.settings.secondary.symbol.clone(),
        }
    }

    /// Human-readable amount, e.g. `"10.00 BT"`. Presentation only.
    pub fn format(&self, amount: Decimal, side: CurrencySide) -> String {
        let label = match side {
            CurrencySide::Primary => &self.settings.primary,
            CurrencySide::Secondary => &self.settings.secondary,
        };
        format!("{} {}", self.round(amount), label.code)
    }

    /// Rounds half away from zero and pins the scale so `100` renders as `100.00`.
    fn round(&self, amount: Decimal) -> Decimal {
        let mut rounded = amount.round_dp_with_strategy(
            self.settings.decimal_places,
            RoundingStrategy::MidpointAwayFromZero,
        );
        rounded.rescale(self.settings.decimal_places);
        rounded
    }
}

impl Default for CurrencyConverter {
    fn default() -> Self {
        Self {
            settings: CurrencySettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn converter(rate: Decimal, decimal_places: u32) -> CurrencyConverter {
        CurrencyConverter::new(CurrencySettings {
            rate,
            decimal_places,
            ..CurrencySettings::default()
        })
        .unwrap()
    }

    #[test]
    fn converts_with_fixed_rate() {
        let c = converter(dec!(10), 2);
        assert_eq!(c.to_secondary(dec!(100)), dec!(10.00));
        assert_eq!(c.to_primary(dec!(10.00)), dec!(100));
        assert_eq!(c.to_secondary(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn rounds_midpoint_away_from_zero() {
        let c = converter(dec!(10), 2);
        assert_eq!(c.to_secondary(dec!(0.125)), dec!(0.01));
        assert_eq!(c.to_secondary(dec!(0.05)), dec!(0.01));
        assert_eq!(c.to_secondary(dec!(0.04)), dec!(0.00));
    }

    #[test]
    fn view_renders_both_currencies() {
        let view = converter(dec!(10), 2).view(dec!(70));
        assert_eq!(view.amount_primary, dec!(70));
        assert_eq!(view.amount_secondary, dec!(7));
        assert_eq!(view.currency_primary, "RUB");
        assert_eq!(view.currency_secondary, "BT");
        assert_eq!(view.amount_primary.to_string(), "70.00");
    }

    #[test]
    fn format_is_presentational() {
        let c = converter(dec!(10), 2);
        assert_eq!(c.format(dec!(10), CurrencySide::Secondary), "10.00 BT");
        assert_eq!(c.format(dec!(99.999), CurrencySide::Primary), "100.00 RUB");
    }

    #[test]
    fn rejects_invalid_settings() {
        let zero_rate = CurrencyConverter::new(CurrencySettings {
            rate: Decimal::ZERO,
            ..CurrencySettings::default()
        });
        assert_eq!(
            zero_rate.unwrap_err(),
            ConfigError::NonPositiveRate(Decimal::ZERO)
        );

        let too_precise = CurrencyConverter::new(CurrencySettings {
            decimal_places: 12,
            ..CurrencySettings::default()
        });
        assert_eq!(
            too_precise.unwrap_err(),
            ConfigError::TooManyDecimalPlaces(12)
        );
    }

    proptest! {
        #[test]
        fn round_trip_stays_within_rounding_tolerance(
            cents in 0i64..1_000_000_000,
            rate_idx in 0usize..4,
        ) {
            let rate = [dec!(1), dec!(3), dec!(10), dec!(97.5)][rate_idx];
            let c = converter(rate, 2);
            let x = Decimal::new(cents, 2);

            let back = c.to_primary(c.to_secondary(x));
            let tolerance = (rate + Decimal::ONE) * dec!(0.005);
            prop_assert!((back - x).abs() <= tolerance, "x={x} back={back}");
        }
    }
}
