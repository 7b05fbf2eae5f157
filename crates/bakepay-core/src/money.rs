//! # Fixed-point money
//!
//! All payout math runs on [`Mutez`], a signed integer amount in the smallest
//! unit of the chain token. Rates (fees, donations, income shares) are
//! [`Portion`]s expressed in ten-thousandths, so taking a share of an amount
//! never touches floating point.
//!
//! ```text
//! portion(v, p) = floor(v * p / 10_000)      0 < p < 10_000
//! portion(v, p) = 0                          p == 0
//! portion(v, p) = v                          p == 10_000
//! ```

use crate::constants::{MUTEZ_FACTOR, PORTION_SCALE, TOKEN_SYMBOL};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Signed amount in µ-token units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mutez(i128);

impl Mutez {
    pub const ZERO: Mutez = Mutez(0);

    pub const fn new(value: i128) -> Self {
        Self(value)
    }

    /// Whole tokens to µ-tokens.
    pub const fn from_tez(tez: i64) -> Self {
        Self(tez as i128 * MUTEZ_FACTOR as i128)
    }

    pub const fn value(&self) -> i128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Mutez) -> Option<Mutez> {
        self.0.checked_add(other.0).map(Mutez)
    }

    pub fn checked_sub(self, other: Mutez) -> Option<Mutez> {
        self.0.checked_sub(other.0).map(Mutez)
    }

    pub fn checked_mul(self, other: Mutez) -> Option<Mutez> {
        self.0.checked_mul(other.0).map(Mutez)
    }

    /// Floor division, `None` when dividing by zero.
    pub fn checked_div(self, other: Mutez) -> Option<Mutez> {
        if other.0 == 0 {
            return None;
        }
        Some(Mutez(floor_div(self.0, other.0)))
    }

    pub fn mul_i64(self, factor: i64) -> Mutez {
        Mutez(self.0 * factor as i128)
    }

    /// Floor division by a plain integer. Panics on zero like integer division.
    pub fn div_i64(self, divisor: i64) -> Mutez {
        Mutez(floor_div(self.0, divisor as i128))
    }

    pub fn add_i64(self, value: i64) -> Mutez {
        Mutez(self.0 + value as i128)
    }

    pub fn sub_i64(self, value: i64) -> Mutez {
        Mutez(self.0 - value as i128)
    }

    /// `floor(self * numerator / denominator)`, zero when `denominator` is zero.
    pub fn mul_div(self, numerator: Mutez, denominator: Mutez) -> Mutez {
        if denominator.is_zero() {
            return Mutez::ZERO;
        }
        Mutez(floor_div(self.0 * numerator.0, denominator.0))
    }

    /// Share of this amount. See module docs for the boundary rules.
    pub fn portion(self, portion: Portion) -> Mutez {
        if portion.is_zero() {
            return Mutez::ZERO;
        }
        if portion.is_whole() {
            return self;
        }
        Mutez(floor_div(self.0 * portion.0 as i128, PORTION_SCALE as i128))
    }

    pub fn min(self, other: Mutez) -> Mutez {
        std::cmp::min(self, other)
    }

    pub fn max(self, other: Mutez) -> Mutez {
        std::cmp::max(self, other)
    }

    /// Saturating conversion for APIs that speak in i64 (gas, fees).
    pub fn as_i64(&self) -> i64 {
        self.0.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Human readable amount, empty for zero (table output).
    pub fn to_tez_string(&self) -> String {
        if self.is_zero() {
            return String::new();
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let factor = MUTEZ_FACTOR as u128;
        format!("{}{}.{:06} {}", sign, abs / factor, abs % factor, TOKEN_SYMBOL)
    }
}

fn floor_div(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

impl From<i64> for Mutez {
    fn from(value: i64) -> Self {
        Mutez(value as i128)
    }
}

impl From<i128> for Mutez {
    fn from(value: i128) -> Self {
        Mutez(value)
    }
}

impl Add for Mutez {
    type Output = Mutez;

    fn add(self, rhs: Mutez) -> Mutez {
        Mutez(self.0 + rhs.0)
    }
}

impl AddAssign for Mutez {
    fn add_assign(&mut self, rhs: Mutez) {
        self.0 += rhs.0;
    }
}

impl Sub for Mutez {
    type Output = Mutez;

    fn sub(self, rhs: Mutez) -> Mutez {
        Mutez(self.0 - rhs.0)
    }
}

impl SubAssign for Mutez {
    fn sub_assign(&mut self, rhs: Mutez) {
        self.0 -= rhs.0;
    }
}

impl Neg for Mutez {
    type Output = Mutez;

    fn neg(self) -> Mutez {
        Mutez(-self.0)
    }
}

impl Sum for Mutez {
    fn sum<I: Iterator<Item = Mutez>>(iter: I) -> Mutez {
        iter.fold(Mutez::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Mutez> for Mutez {
    fn sum<I: Iterator<Item = &'a Mutez>>(iter: I) -> Mutez {
        iter.copied().sum()
    }
}

impl fmt::Display for Mutez {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Mutez {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i128>().map(Mutez)
    }
}

// Amounts travel as decimal strings so no consumer truncates them to f64.
impl Serialize for Mutez {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Mutez {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MutezVisitor;

        impl<'de> Visitor<'de> for MutezVisitor {
            type Value = Mutez;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer amount or a decimal string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Mutez, E> {
                Ok(Mutez(v as i128))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Mutez, E> {
                Ok(Mutez(v as i128))
            }

            fn visit_i128<E: de::Error>(self, v: i128) -> Result<Mutez, E> {
                Ok(Mutez(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Mutez, E> {
                v.parse::<Mutez>().map_err(|e| E::custom(format!("invalid amount '{}': {}", v, e)))
            }
        }

        deserializer.deserialize_any(MutezVisitor)
    }
}

/// Fraction in ten-thousandths (`10_000` is the whole).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Portion(u32);

impl Portion {
    pub const ZERO: Portion = Portion(0);
    pub const WHOLE: Portion = Portion(PORTION_SCALE);

    /// Clamps into `0..=10_000`.
    pub const fn from_units(units: u32) -> Self {
        if units > PORTION_SCALE {
            Self(PORTION_SCALE)
        } else {
            Self(units)
        }
    }

    /// Decimal rate to portion. Rounded to the nearest ten-thousandth so
    /// representational noise (`0.29 * 10_000 = 2899.999..`) does not lose a unit.
    pub fn from_f64(rate: f64) -> Self {
        if !rate.is_finite() || rate <= 0.0 {
            return Self::ZERO;
        }
        if rate >= 1.0 {
            return Self::WHOLE;
        }
        Self::from_units((rate * PORTION_SCALE as f64).round() as u32)
    }

    pub const fn units(&self) -> u32 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / PORTION_SCALE as f64
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_whole(&self) -> bool {
        self.0 >= PORTION_SCALE
    }

    /// `1 - self`.
    pub fn complement(&self) -> Portion {
        Portion(PORTION_SCALE - self.0.min(PORTION_SCALE))
    }

    /// Sum of several portions, `None` when it exceeds the whole.
    pub fn checked_total<'a, I: IntoIterator<Item = &'a Portion>>(portions: I) -> Option<Portion> {
        let total: u64 = portions.into_iter().map(|p| p.0 as u64).sum();
        if total > PORTION_SCALE as u64 {
            None
        } else {
            Some(Portion(total as u32))
        }
    }

    /// Percentage for tables, empty for zero.
    pub fn to_percentage_string(&self) -> String {
        if self.is_zero() {
            return String::new();
        }
        format!("{:.2}%", self.as_f64() * 100.0)
    }
}

impl fmt::Display for Portion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_f64())
    }
}

impl Serialize for Portion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Portion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rate = f64::deserialize(deserializer)?;
        if !(0.0..=1.0).contains(&rate) {
            return Err(de::Error::custom(format!("rate {} is outside of [0, 1]", rate)));
        }
        Ok(Portion::from_f64(rate))
    }
}
