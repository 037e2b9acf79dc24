use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::{fmt, iter::Sum};
use thiserror::Error;

/// Decimals displayed in report cells. Allocation and lot splitting run in full
/// precision; rounding happens here and nowhere earlier.
pub(crate) const REPORT_DIGITS: u32 = 8;

/// Since we can't ensure that all arithmetic has infinite precision, we need an epsilon for
/// comparisons. Quantities below this threshold are treated as exhausted.
const AMOUNT_EPSILON: &str = "0.000_000_001";

#[derive(Debug, Error)]
pub enum ParseAmountError {
    /// Unable to parse decimal string.
    #[error("Unable to parse decimal string")]
    Decimal(#[from] rust_decimal::Error),
}

/// A signed quantity of some asset (negative = outflow from the account).
#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct AssetAmount(Decimal);

/// A monetary value denominated in whatever currency funded or received a trade.
///
/// This engine never converts between fiat currencies; a `CashValue` keeps the
/// denomination of its counterpart leg.
#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct CashValue(Decimal);

macro_rules! impl_math_ops {
    ($name:ident) => {
        impl ::std::ops::Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl ::std::ops::AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl ::std::ops::Neg for $name {
            type Output = Self;

            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl ::std::ops::Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl ::std::ops::SubAssign for $name {
            fn sub_assign(&mut self, rhs: Self) {
                self.0 -= rhs.0;
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold(Self::default(), |acc, x| acc + x)
            }
        }

        impl FromStr for $name {
            type Err = ParseAmountError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Decimal::from_str(s)?))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.normalize().fmt(f)
            }
        }

        impl $name {
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            pub fn is_positive(self) -> bool {
                self.0 > Decimal::ZERO
            }

            pub fn is_negative(self) -> bool {
                self.0 < Decimal::ZERO
            }

            /// True when the magnitude is at or below the shared epsilon.
            pub fn is_negligible(self) -> bool {
                self.0.abs() <= AMOUNT_EPSILON.parse().unwrap()
            }

            pub fn is_fuzzy_eq(self, other: Self) -> bool {
                (self.0 - other.0).abs() <= AMOUNT_EPSILON.parse().unwrap()
            }

            /// Rounded copy for report cells.
            pub(crate) fn rounded(self) -> Decimal {
                self.0.round_dp(REPORT_DIGITS).normalize()
            }

            /// Scale this value by a fraction computed with
            /// [`AssetAmount::fraction_of`].
            pub fn portion(self, fraction: Decimal) -> Self {
                Self(self.0 * fraction)
            }
        }
    };
}

impl_math_ops!(AssetAmount);
impl_math_ops!(CashValue);

impl AssetAmount {
    /// The fraction this quantity represents of `total`, in full precision.
    ///
    /// Returns `None` when `total` is zero, so allocation against an empty
    /// aggregate degrades to zero instead of a division fault.
    pub fn fraction_of(self, total: Self) -> Option<Decimal> {
        if total.0.is_zero() {
            None
        } else {
            Some(self.0 / total.0)
        }
    }
}

/// Fiat legs carry their amount in the quantity column; resolving a counterpart
/// reinterprets that quantity as money.
impl From<AssetAmount> for CashValue {
    fn from(value: AssetAmount) -> Self {
        Self(value.0)
    }
}
