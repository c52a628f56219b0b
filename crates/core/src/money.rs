//! Fixed-point monetary amounts.
//!
//! Every [`Money`] value carries exactly [`SCALE`] fractional digits. Values are
//! normalized on construction with [`RoundingStrategy::MidpointAwayFromZero`], so
//! arithmetic never falls back to binary floating point and two amounts compare
//! equal exactly when their 4-place renderings are equal.
//!
//! Conversion from text or JSON numbers happens only at the boundary
//! ([`Money::parse`], [`FromStr`], `Deserialize`). Boundary values must fit
//! `NUMERIC(19,4)`, i.e. have at most [`MAX_INTEGER_DIGITS`] integer digits.
//! Operators saturate instead of panicking; [`Money::checked_add`] and
//! [`Money::try_sum`] report overflow as a validation error.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};

/// Number of fractional digits carried by every amount.
pub const SCALE: u32 = 4;

/// Rounding applied whenever a value is brought to [`SCALE`].
pub const ROUNDING: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

/// Integer digits storable in a `NUMERIC(19,4)` column.
pub const MAX_INTEGER_DIGITS: u32 = 15;

/// Exclusive magnitude bound for boundary amounts: `10^15`.
fn amount_limit() -> Decimal {
    Decimal::from(10i64.pow(MAX_INTEGER_DIGITS))
}

/// A currency amount with a fixed scale of 4.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    /// `0.0000`
    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, SCALE));

    /// Normalize an arbitrary decimal to scale 4.
    pub fn new(value: Decimal) -> Self {
        let mut normalized = value.round_dp_with_strategy(SCALE, ROUNDING);
        normalized.rescale(SCALE);
        if normalized.is_zero() {
            normalized.set_sign_positive(true);
        }
        Self(normalized)
    }

    /// Normalize `value` and reject magnitudes of `10^15` or more.
    pub fn try_new(value: Decimal) -> DomainResult<Self> {
        let money = Self::new(value);
        if money.0.abs() >= amount_limit() {
            return Err(DomainError::validation(format!(
                "invalid amount: {value} exceeds {MAX_INTEGER_DIGITS} integer digits"
            )));
        }
        Ok(money)
    }

    /// Whole currency units, e.g. `from_major(12)` is `12.0000`.
    pub fn from_major(units: i64) -> Self {
        Self::new(Decimal::from(units))
    }

    /// Parse boundary text such as `"1000"`, `"1000.00"` or `"-0.12345"`.
    pub fn parse(s: &str) -> DomainResult<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("invalid amount: empty value"));
        }
        let value = Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|_| DomainError::validation(format!("invalid amount: {trimmed:?}")))?;
        Self::try_new(value)
    }

    /// Sum any number of amounts, starting from `0.0000`. Saturates at the
    /// decimal range; use [`Money::try_sum`] where overflow must be reported.
    pub fn sum<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Money>,
    {
        values.into_iter().fold(Self::ZERO, |acc, v| acc + v)
    }

    /// Sum that fails instead of saturating.
    pub fn try_sum<I>(values: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        values.into_iter().try_fold(Self::ZERO, |acc, v| {
            acc.checked_add(v)
                .ok_or_else(|| DomainError::validation("invalid amount: total overflows the decimal range"))
        })
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money::new)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money::new)
    }

    /// Multiply by a rate (tax rates, GST divisors, `-1`).
    pub fn multiply(self, factor: Decimal) -> Self {
        Self::new(self.0.saturating_mul(factor))
    }

    /// Divide by a non-zero decimal.
    pub fn divide(self, divisor: Decimal) -> DomainResult<Self> {
        self.0
            .checked_div(divisor)
            .map(Self::new)
            .ok_or_else(|| DomainError::validation("cannot divide an amount by zero"))
    }

    /// Canonical equality: both sides compared at scale 4.
    pub fn is_equal(&self, other: &Money) -> bool {
        self.0 == other.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    pub fn negate(self) -> Self {
        -self
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Money({})", self.0)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money::new(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money::new(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        *self = *self - rhs;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money::new(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        Money::sum(iter)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        Money::sum(iter.copied())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl Visitor<'_> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount as a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Money::try_new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        Money::try_new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        let value = Decimal::try_from(v).map_err(|_| E::custom(format!("invalid amount: {v}")))?;
        Money::try_new(value).map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    #[test]
    fn always_renders_four_places() {
        assert_eq!(m("1000").to_string(), "1000.0000");
        assert_eq!(m("1000.00").to_string(), "1000.0000");
        assert_eq!(Money::ZERO.to_string(), "0.0000");
        assert_eq!(Money::default().to_string(), "0.0000");
    }

    #[test]
    fn rounds_midpoint_away_from_zero() {
        assert_eq!(m("0.00005").to_string(), "0.0001");
        assert_eq!(m("-0.00005").to_string(), "-0.0001");
        assert_eq!(m("1.23444").to_string(), "1.2344");
    }

    #[test]
    fn negative_zero_is_normalized() {
        let z = m("-0.00001");
        assert!(z.is_zero());
        assert_eq!(z.to_string(), "0.0000");
        assert!(!z.is_negative());
    }

    #[test]
    fn add_avoids_float_drift() {
        let total = Money::sum([m("0.1"), m("0.2")]);
        assert!(total.is_equal(&m("0.3")));
        assert_eq!(Money::sum(Vec::new()), Money::ZERO);
    }

    #[test]
    fn subtract_and_multiply_keep_scale() {
        assert_eq!((m("10") - m("0.0001")).to_string(), "9.9999");
        assert_eq!(m("100").multiply(Decimal::new(1, 1)).to_string(), "10.0000");
        assert_eq!(m("-250").multiply(Decimal::new(15, 2)).to_string(), "-37.5000");
    }

    #[test]
    fn divide_by_zero_is_rejected() {
        assert!(m("1").divide(Decimal::ZERO).is_err());
        assert_eq!(m("110").divide(Decimal::new(11, 1)).unwrap().to_string(), "100.0000");
    }

    #[test]
    fn equality_is_canonical() {
        assert!(m("1000.00").is_equal(&m("1000.0000")));
        assert!(!m("1000.0001").is_equal(&m("1000")));
    }

    #[test]
    fn parse_rejects_non_numeric_text() {
        assert!(matches!(Money::parse(""), Err(DomainError::Validation(_))));
        assert!(matches!(Money::parse("ten"), Err(DomainError::Validation(_))));
    }

    #[test]
    fn serde_accepts_strings_and_numbers() {
        let from_str: Money = serde_json::from_str("\"12.5\"").unwrap();
        let from_int: Money = serde_json::from_str("12").unwrap();
        let from_float: Money = serde_json::from_str("12.5").unwrap();
        assert_eq!(from_str, m("12.5"));
        assert_eq!(from_int, m("12"));
        assert_eq!(from_float, m("12.5"));
        assert_eq!(serde_json::to_string(&from_str).unwrap(), "\"12.5000\"");
    }

    #[test]
    fn boundary_amounts_fit_numeric_19_4() {
        assert_eq!(m("999999999999999.9999").to_string(), "999999999999999.9999");
        assert_eq!(m("-999999999999999.9999").to_string(), "-999999999999999.9999");

        for too_big in ["1000000000000000", "1e26", "-4e28", "999999999999999.99995"] {
            let err = Money::parse(too_big).unwrap_err();
            assert!(err.to_string().starts_with("invalid amount"), "{too_big}: {err}");
        }

        assert!(serde_json::from_str::<Money>("1e20").is_err());
        assert!(serde_json::from_str::<Money>("18446744073709551615").is_err());
        assert!(serde_json::from_str::<Money>("\"1e15\"").is_err());
    }

    #[test]
    fn arithmetic_never_panics_at_the_decimal_limit() {
        let huge = Money::new(Decimal::MAX);
        assert!(huge.checked_add(huge).is_none());
        assert!(huge.negate().checked_sub(huge).is_none());
        assert!(Money::try_sum([huge, huge]).is_err());

        // Operators saturate.
        assert_eq!((huge + huge).as_decimal(), Decimal::MAX);
        assert_eq!((huge.negate() - huge).as_decimal(), Decimal::MIN);
        assert_eq!(Money::sum([huge, huge, Money::from_major(1)]).as_decimal(), Decimal::MAX);
    }

    #[test]
    fn try_sum_matches_sum_in_range() {
        let values = [m("0.1"), m("0.2"), m("-0.05")];
        assert_eq!(Money::try_sum(values).unwrap(), Money::sum(values));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn addition_is_order_independent(values in proptest::collection::vec(-1_000_000_000i64..1_000_000_000i64, 0..40)) {
            let amounts: Vec<Money> = values.iter().map(|v| Money::new(Decimal::new(*v, SCALE))).collect();
            let forward = Money::sum(amounts.iter().copied());
            let backward = Money::sum(amounts.iter().rev().copied());
            prop_assert!(forward.is_equal(&backward));
        }
    }
}
