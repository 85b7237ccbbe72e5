//! Money types with precise decimal arithmetic
//!
//! Balances, invoice totals and line prices are all carried as [`Money`]:
//! a `rust_decimal` amount tagged with an ISO 4217 currency. Floating point
//! values are only accepted at system boundaries (scanned receipts, JSON
//! forms) through [`Money::try_from_f64`], which rejects NaN and infinities.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    USD,
    CAD,
    EUR,
    GBP,
}

impl Currency {
    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        2
    }

    /// Returns the currency symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::CAD => "C$",
            Currency::EUR => "€",
            Currency::GBP => "£",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::CAD => "CAD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "CAD" => Ok(Currency::CAD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount is not a finite number")]
    NonFinite,

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Amount out of range")]
    Overflow,
}

/// A monetary amount with associated currency
///
/// Amounts are stored with 4 decimal places internally so unit prices such
/// as fuel per-gallon rates survive multiplication before rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: amount.round_dp(4),
            currency,
        }
    }

    /// Creates Money from an integer amount in minor units (e.g., cents)
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self::new(Decimal::new(minor_units, currency.decimal_places()), currency)
    }

    /// Converts a boundary float into Money, rejecting NaN and infinities
    pub fn try_from_f64(value: f64, currency: Currency) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::NonFinite);
        }
        let amount = Decimal::from_f64(value)
            .ok_or_else(|| MoneyError::InvalidAmount(value.to_string()))?;
        Ok(Self::new(amount, currency))
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: dec!(0),
            currency,
        }
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Returns true if the amount is strictly less than zero
    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self {
            amount: self.amount.abs(),
            currency: self.currency,
        }
    }

    /// Rounds to the currency's standard decimal places (half away from zero)
    pub fn round_to_currency(&self) -> Self {
        Self {
            amount: self.amount.round_dp_with_strategy(
                self.currency.decimal_places(),
                rust_decimal::RoundingStrategy::MidpointAwayFromZero,
            ),
            currency: self.currency,
        }
    }

    /// Returns zero if this amount is negative, otherwise the amount itself
    pub fn floor_at_zero(&self) -> Self {
        if self.is_negative() {
            Self::zero(self.currency)
        } else {
            *self
        }
    }

    /// Checked addition that returns an error on currency mismatch
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let amount = self.amount.checked_add(other.amount).ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency))
    }

    /// Checked subtraction that returns an error on currency mismatch
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let amount = self.amount.checked_sub(other.amount).ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency))
    }

    /// Multiplies by a scalar (quantities, rates)
    pub fn multiply(&self, factor: Decimal) -> Result<Self, MoneyError> {
        let amount = self.amount.checked_mul(factor).ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency))
    }

    /// Sums an iterator of amounts, all of which must share `currency`
    pub fn sum<'a, I>(currency: Currency, amounts: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.round_to_currency();
        write!(
            f,
            "{}{:.dp$}",
            self.currency.symbol(),
            rounded.amount,
            dp = self.currency.decimal_places() as usize
        )
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.amount, self.currency)
    }
}

/// A percentage rate such as a sales tax rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    /// The rate as a decimal (e.g., 0.0725 for 7.25%)
    value: Decimal,
}

impl Rate {
    /// Creates a rate from a decimal value (e.g., 0.05 for 5%)
    pub fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Creates a rate from a percentage (e.g., 7.25 for 7.25%)
    pub fn from_percentage(percentage: Decimal) -> Self {
        Self {
            value: percentage / dec!(100),
        }
    }

    pub fn as_decimal(&self) -> Decimal {
        self.value
    }

    pub fn as_percentage(&self) -> Decimal {
        self.value * dec!(100)
    }

    /// Applies this rate to a money amount
    pub fn apply(&self, money: &Money) -> Result<Money, MoneyError> {
        money.multiply(self.value)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_minor() {
        let m = Money::from_minor(4550, Currency::USD);
        assert_eq!(m.amount(), dec!(45.50));
    }

    #[test]
    fn test_currency_mismatch() {
        let usd = Money::new(dec!(100.00), Currency::USD);
        let cad = Money::new(dec!(100.00), Currency::CAD);

        let result = usd.checked_add(&cad);
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_try_from_f64_rejects_non_finite() {
        assert_eq!(
            Money::try_from_f64(f64::NAN, Currency::USD),
            Err(MoneyError::NonFinite)
        );
        assert_eq!(
            Money::try_from_f64(f64::INFINITY, Currency::USD),
            Err(MoneyError::NonFinite)
        );
        let m = Money::try_from_f64(12.5, Currency::USD).unwrap();
        assert_eq!(m.amount(), dec!(12.5));
    }

    #[test]
    fn test_floor_at_zero() {
        let negative = Money::new(dec!(-20.00), Currency::USD);
        assert!(negative.floor_at_zero().is_zero());

        let positive = Money::new(dec!(20.00), Currency::USD);
        assert_eq!(positive.floor_at_zero(), positive);
    }

    #[test]
    fn test_round_to_currency_half_up() {
        let m = Money::new(dec!(107.2500), Currency::USD);
        assert_eq!(m.round_to_currency().amount(), dec!(107.25));
        let m = Money::new(dec!(0.125), Currency::USD);
        assert_eq!(m.round_to_currency().amount(), dec!(0.13));
    }

    #[test]
    fn test_rate_application() {
        let rate = Rate::from_percentage(dec!(7.25));
        let subtotal = Money::new(dec!(100.00), Currency::USD);

        assert_eq!(rate.apply(&subtotal).unwrap().amount(), dec!(7.25));
        assert_eq!(rate.to_string(), "7.25%");
    }

    #[test]
    fn test_overflow_is_an_error() {
        let huge = Money::new(Decimal::MAX, Currency::USD);
        assert_eq!(huge.checked_add(&huge), Err(MoneyError::Overflow));
        assert_eq!((-huge).checked_sub(&huge), Err(MoneyError::Overflow));
        assert_eq!(
            Money::new(dec!(10000000000), Currency::USD).multiply(dec!(100000000000000000000)),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_display() {
        let m = Money::new(dec!(57.5), Currency::USD);
        assert_eq!(m.to_string(), "$57.50");
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::USD);
        assert!("XYZ".parse::<Currency>().is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn money_sum_is_order_independent(
            mut amounts in proptest::collection::vec(-1_000_000i64..1_000_000i64, 0..32)
        ) {
            let forward: Vec<Money> = amounts.iter().map(|a| Money::from_minor(*a, Currency::USD)).collect();
            amounts.reverse();
            let backward: Vec<Money> = amounts.iter().map(|a| Money::from_minor(*a, Currency::USD)).collect();

            prop_assert_eq!(
                Money::sum(Currency::USD, &forward).unwrap(),
                Money::sum(Currency::USD, &backward).unwrap()
            );
        }

        #[test]
        fn floor_at_zero_is_never_negative(minor in -1_000_000_000i64..1_000_000_000i64) {
            let m = Money::from_minor(minor, Currency::USD);
            prop_assert!(!m.floor_at_zero().is_negative());
        }
    }
}
