//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A debt balance that drifts by a fraction every sale never reaches     │
//! │  exactly zero, and the debtor never becomes "paid".                    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    price 1000 × qty 3 = 3000, always                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use ombor_core::money::Money;
//!
//! let price = Money::from_minor(1000);
//! let line_total = price.times(3);
//! assert_eq!(line_total.minor(), 3000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Serialized as a bare JSON number, so `{"price": 1000}` on the wire.
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price ──► line total ──► record.totalAmount ──► debtAmount    │
/// │  Product.cost  ──► record.totalCost ──► record.profit                  │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use ombor_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(5000).minor(), 5000);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    ///
    /// ## Example
    /// ```rust
    /// use ombor_core::money::Money;
    ///
    /// let refund = Money::from_minor(-550);
    /// assert_eq!(refund.abs().minor(), 550);
    /// ```
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies a unit amount by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use ombor_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(1000);
    /// assert_eq!(unit_price.times(3).minor(), 3000);
    /// ```
    #[inline]
    pub const fn times(&self, quantity: i64) -> Self {
        Money(self.0 * quantity)
    }

    /// [`times`](Money::times), or `None` on overflow.
    #[inline]
    pub const fn checked_times(&self, quantity: i64) -> Option<Self> {
        match self.0.checked_mul(quantity) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Returns the larger of `self` and zero.
    #[inline]
    pub fn floor_zero(self) -> Self {
        Money(self.0.max(0))
    }

    /// Integer average over `count` items; zero when `count` is zero.
    pub fn average(self, count: i64) -> Money {
        if count == 0 {
            Money::zero()
        } else {
            Money(self.0 / count)
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(600);

        assert_eq!((a + b).minor(), 1600);
        assert_eq!((a - b).minor(), 400);
        assert_eq!((-a).minor(), -1000);
        assert_eq!(a.times(3).minor(), 3000);
    }

    #[test]
    fn test_sum() {
        let lines = [Money::from_minor(3000), Money::from_minor(1200)];
        let total: Money = lines.iter().sum();
        assert_eq!(total.minor(), 4200);

        let empty: Money = Vec::<Money>::new().into_iter().sum();
        assert!(empty.is_zero());
    }

    #[test]
    fn test_floor_zero_and_average() {
        assert_eq!(Money::from_minor(-5).floor_zero(), Money::zero());
        assert_eq!(Money::from_minor(7).floor_zero().minor(), 7);
        assert_eq!(Money::from_minor(9000).average(3).minor(), 3000);
        assert_eq!(Money::from_minor(9000).average(0), Money::zero());
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_string(&Money::from_minor(5000)).unwrap();
        assert_eq!(json, "5000");

        let back: Money = serde_json::from_str("1200").unwrap();
        assert_eq!(back.minor(), 1200);
    }

    #[test]
    fn test_checked_arithmetic() {
        let big = Money::from_minor(i64::MAX / 2 + 1);
        assert_eq!(big.checked_times(2), None);
        assert_eq!(big.checked_add(big), None);
        assert_eq!(Money::from_minor(1000).checked_times(3), Some(Money::from_minor(3000)));
        assert_eq!(
            Money::from_minor(1).checked_add(Money::from_minor(2)),
            Some(Money::from_minor(3))
        );
    }

    #[test]
    fn test_sign_checks() {
        assert!(Money::zero().is_zero());
        assert!(Money::from_minor(1).is_positive());
        assert!(Money::from_minor(-1).is_negative());
    }
}
