//! Type-safe unit price representation using decimal arithmetic.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`UnitPrice`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price must not be negative (got {0})")]
    Negative(Decimal),
}

/// A non-negative price for a single unit of a product.
///
/// The amount is in the store's standard currency unit (e.g. euros, not
/// cents). Currency is a store-level setting and is not carried per price.
///
/// Serializes as a decimal string (`"19.99"`) so that no precision is lost
/// between the backend, the device cache and the database.
///
/// ```
/// use rust_decimal::Decimal;
/// use shopfront_core::UnitPrice;
///
/// assert!(UnitPrice::new(Decimal::new(1999, 2)).is_ok());
/// assert!(UnitPrice::new(Decimal::new(-1, 0)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct UnitPrice(Decimal);

impl UnitPrice {
    /// A price of zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a unit price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if `amount` is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Get the decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Decimal {
        self.0 * Decimal::from(quantity)
    }
}

impl TryFrom<Decimal> for UnitPrice {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<UnitPrice> for Decimal {
    fn from(price: UnitPrice) -> Self {
        price.0
    }
}

impl fmt::Display for UnitPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_negative() {
        let err = UnitPrice::new(Decimal::new(-5, 1)).unwrap_err();
        assert_eq!(err, PriceError::Negative(Decimal::new(-5, 1)));
    }

    #[test]
    fn test_accepts_zero() {
        assert_eq!(UnitPrice::new(Decimal::ZERO).unwrap(), UnitPrice::ZERO);
    }

    #[test]
    fn test_times() {
        let price = UnitPrice::new(Decimal::new(250, 2)).unwrap();
        assert_eq!(price.times(4), Decimal::new(1000, 2));
    }

    #[test]
    fn test_serializes_as_string() {
        let price = UnitPrice::new(Decimal::new(1999, 2)).unwrap();
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"19.99\"");
        let back: UnitPrice = serde_json::from_str(&json).unwrap();
        assert_eq!(back, price);
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        assert!(serde_json::from_str::<UnitPrice>("\"-1.00\"").is_err());
    }

    #[test]
    fn test_display_two_decimals() {
        let price = UnitPrice::new(Decimal::new(5, 0)).unwrap();
        assert_eq!(price.to_string(), "5.00");
    }
}
