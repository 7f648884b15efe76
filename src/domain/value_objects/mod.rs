//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn usd(amount: Decimal) -> Self { Self::new(amount, "USD") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }
}

impl Default for Money { fn default() -> Self { Self::zero("USD") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount, self.currency) }
}

#[derive(Debug, Clone)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Currency mismatch") }
}

/// Display rating, clamped to the 0-5 star scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rating(f32);

impl Rating {
    pub fn new(value: f32) -> Self { Self(value.clamp(0.0, 5.0)) }
    pub fn value(&self) -> f32 { self.0 }
}

impl Default for Rating { fn default() -> Self { Self(0.0) } }

impl TryFrom<f32> for Rating {
    type Error = std::convert::Infallible;
    fn try_from(value: f32) -> Result<Self, Self::Error> { Ok(Self::new(value)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_money_add() {
        let a = Money::usd(Decimal::new(100, 0));
        let b = Money::usd(Decimal::new(50, 0));
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
    }
    #[test]
    fn test_money_multiply_exact() {
        // 19.99 * 3 must not pick up float noise
        let price = Money::usd(Decimal::new(1999, 2));
        assert_eq!(price.multiply(3).amount(), Decimal::new(5997, 2));
    }
    #[test]
    fn test_rating_clamped() {
        assert_eq!(Rating::new(6.5).value(), 5.0);
        assert_eq!(Rating::new(-1.0).value(), 0.0);
        assert_eq!(Rating::new(4.5).value(), 4.5);
    }
}
