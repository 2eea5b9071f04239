use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::*;
use thiserror::Error;

/// Money in integer minor units (cents). Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u64);

/// Rejected decimal input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("amount cannot be negative")]
    Negative,
    #[error("amount is too large")]
    Overflow,
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Minor units per major unit.
    pub const SCALE: u32 = 2;

    pub const fn from_minor(value: u64) -> Self {
        Amount(value)
    }

    pub const fn minor(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Convert user-facing decimal input ("40", "40.5", "40.555") into minor
    /// units, rounding half away from zero.
    pub fn from_decimal(value: Decimal) -> Result<Self, AmountError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative);
        }
        let scaled = value
            .checked_mul(Decimal::from(10u64.pow(Self::SCALE)))
            .ok_or(AmountError::Overflow)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        scaled.to_u64().map(Amount).ok_or(AmountError::Overflow)
    }

    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let trimmed = input.trim();
        let value = Decimal::from_str(trimmed)
            .map_err(|_| AmountError::NotANumber(trimmed.to_string()))?;
        Self::from_decimal(value)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::from_i128_with_scale(self.0 as i128, Self::SCALE)
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = 10u64.pow(Self::SCALE);
        write!(f, "{}.{:02}", self.0 / scale, self.0 % scale)
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_whole_and_fractional() {
        assert_eq!(Amount::parse("100").unwrap(), Amount::from_minor(10_000));
        assert_eq!(Amount::parse("40.00").unwrap(), Amount::from_minor(4_000));
        assert_eq!(Amount::parse(" 1.5 ").unwrap(), Amount::from_minor(150));
        assert_eq!(Amount::parse("0.01").unwrap(), Amount::from_minor(1));
    }

    #[test]
    fn parse_rounds_half_away_from_zero() {
        assert_eq!(Amount::parse("1.005").unwrap(), Amount::from_minor(101));
        assert_eq!(Amount::parse("1.004").unwrap(), Amount::from_minor(100));
    }

    #[test]
    fn parse_rejects_garbage_and_negatives() {
        assert!(matches!(
            Amount::parse("ten"),
            Err(AmountError::NotANumber(_))
        ));
        assert_eq!(Amount::parse("-5"), Err(AmountError::Negative));
        assert_eq!(Amount::parse(""), Err(AmountError::NotANumber(String::new())));
    }

    #[test]
    fn parse_rejects_overflow() {
        assert_eq!(
            Amount::parse("9999999999999999999999"),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn display_uses_two_decimals() {
        assert_eq!(Amount::from_minor(10_000).to_string(), "100.00");
        assert_eq!(Amount::from_minor(5).to_string(), "0.05");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
    }

    #[test]
    fn to_decimal_keeps_scale() {
        assert_eq!(Amount::from_minor(3_800).to_decimal(), Decimal::new(3_800, 2));
    }

    #[test]
    fn checked_sub_never_goes_negative() {
        let a = Amount::from_minor(100);
        assert_eq!(a.checked_sub(Amount::from_minor(101)), None);
        assert_eq!(a.checked_sub(a), Some(Amount::ZERO));
    }

    #[test]
    fn sum_adds_all() {
        let total: Amount = [1, 2, 3].into_iter().map(Amount::from_minor).sum();
        assert_eq!(total, Amount::from_minor(6));
    }
}
