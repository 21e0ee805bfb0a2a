//! Precision-safe decimal types for betting.
//!
//! Uses `rust_decimal` for exact decimal arithmetic, avoiding
//! floating-point rounding errors in liability and exposure sums.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal exchange odds.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// odds with stakes in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Odds(pub Decimal);

impl Odds {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Exchange odds are always strictly above 1.0.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 > Decimal::ONE
    }
}

impl fmt::Display for Odds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Odds {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Odds {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

/// Stake amount in account currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stake(pub Decimal);

impl Stake {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Lay liability: stake * (odds - 1), rounded to the penny.
    #[inline]
    pub fn liability(&self, odds: Odds) -> Decimal {
        (self.0 * (odds.0 - Decimal::ONE)).round_dp(2)
    }

    /// Halve the stake, clamped to the given minimum.
    #[inline]
    pub fn halved_clamped(&self, min: Stake) -> Self {
        let half = (self.0 / Decimal::TWO).round_dp(2);
        if half < min.0 {
            min
        } else {
            Self(half)
        }
    }
}

impl fmt::Display for Stake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Stake {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_lay_liability() {
        let stake = Stake::new(dec!(3.00));
        let odds = Odds::new(dec!(3.75));

        // 3.00 * 2.75 = 8.25
        assert_eq!(stake.liability(odds), dec!(8.25));
    }

    #[test]
    fn test_halved_clamped_above_minimum() {
        let stake = Stake::new(dec!(3.00));
        let min = Stake::new(dec!(1.00));
        assert_eq!(stake.halved_clamped(min), Stake::new(dec!(1.50)));
    }

    #[test]
    fn test_halved_clamped_to_minimum() {
        let stake = Stake::new(dec!(1.50));
        let min = Stake::new(dec!(1.00));
        // 0.75 clamps up to the venue minimum
        assert_eq!(stake.halved_clamped(min), Stake::new(dec!(1.00)));
    }

    #[test]
    fn test_odds_validity() {
        assert!(Odds::new(dec!(1.01)).is_valid());
        assert!(!Odds::new(dec!(1.00)).is_valid());
        assert!(!Odds::ZERO.is_valid());
    }
}
