//! Type-safe price representation using decimal arithmetic.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Two unit prices closer than this are the same price snapshot.
pub const PRICE_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price from an amount in the smallest currency unit.
    #[must_use]
    pub fn from_cents(cents: i64, currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::new(cents, 2), currency_code)
    }

    /// Whether `other` is the same price within [`PRICE_EPSILON`].
    ///
    /// Prices in different currencies never match.
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        self.currency_code == other.currency_code
            && (self.amount - other.amount).abs() < PRICE_EPSILON
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:.2}",
            self.currency_code.symbol(),
            self.amount.round_dp(2)
        )
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// ISO 4217 code, e.g. `"USD"`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }

    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

/// Error returned when a currency code is not supported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported currency code: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for CurrencyCode {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            _ => Err(UnknownCurrency(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_epsilon_is_one_cent() {
        assert_eq!(PRICE_EPSILON, Decimal::new(1, 2));
    }

    #[test]
    fn test_approx_eq_within_a_cent() {
        let a = Price::new(Decimal::new(19_990, 3), CurrencyCode::USD);
        let b = Price::new(Decimal::new(19_995, 3), CurrencyCode::USD);
        assert!(a.approx_eq(&b));
    }

    #[test]
    fn test_approx_eq_one_cent_apart_is_different() {
        let a = Price::from_cents(1999, CurrencyCode::USD);
        let b = Price::from_cents(2000, CurrencyCode::USD);
        assert!(!a.approx_eq(&b));
    }

    #[test]
    fn test_approx_eq_requires_same_currency() {
        let a = Price::from_cents(1000, CurrencyCode::USD);
        let b = Price::from_cents(1000, CurrencyCode::CAD);
        assert!(!a.approx_eq(&b));
    }

    #[test]
    fn test_times() {
        let unit = Price::from_cents(250, CurrencyCode::EUR);
        assert_eq!(unit.times(3), Price::from_cents(750, CurrencyCode::EUR));
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::from_cents(1999, CurrencyCode::USD).to_string(), "$19.99");
        assert_eq!(Price::from_cents(500, CurrencyCode::GBP).to_string(), "£5.00");
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("usd".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}
