// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Non-negative exact decimal amounts.
//!
//! Balance values are carried as [`Amount`], a normalised, never-negative
//! wrapper around [`rust_decimal::Decimal`]. The same canonical string is
//! used in storage rows and on the wire, so a value written by one mint reads
//! back bit-identically on another.
//!
//! ```text
//! "0"       zero (the default)
//! "150"     integral value
//! "12.5"    trailing zeros are never emitted
//! ```

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical textual form: digits with an optional fractional part.
static AMOUNT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?$").unwrap_or_else(|_| unreachable!()));

/// Length of the binary encoding.
pub const AMOUNT_BYTES: usize = 16;

/// Errors raised by amount arithmetic and decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// Subtraction would produce a negative amount.
    #[error("amount underflow: {lhs} - {rhs} is negative")]
    Underflow { lhs: Amount, rhs: Amount },

    /// The decimal representation is exhausted.
    #[error("amount overflow: {lhs} + {rhs} is not representable")]
    Overflow { lhs: Amount, rhs: Amount },

    /// Negative values are never valid amounts.
    #[error("amount must not be negative")]
    Negative,

    /// Text or bytes that are not a canonical amount.
    #[error("invalid amount: {0}")]
    Invalid(String),
}

/// A non-negative decimal quantity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Wrap a decimal, rejecting negative values.
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative);
        }
        let mut value = value.normalize();
        value.set_sign_positive(true);
        Ok(Self(value))
    }

    /// Amount from an integral number of units.
    pub fn from_units(units: u64) -> Self {
        Self(Decimal::from(units))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn checked_add(self, rhs: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_add(rhs.0)
            .map(|sum| Amount(sum.normalize()))
            .ok_or(AmountError::Overflow { lhs: self, rhs })
    }

    /// Subtract, failing instead of going below zero.
    pub fn checked_sub(self, rhs: Amount) -> Result<Amount, AmountError> {
        if rhs > self {
            return Err(AmountError::Underflow { lhs: self, rhs });
        }
        self.0
            .checked_sub(rhs.0)
            .map(|diff| Amount(diff.normalize()))
            .ok_or(AmountError::Underflow { lhs: self, rhs })
    }

    /// Binary encoding (rust_decimal's 16-byte layout of the normalised value).
    pub fn to_bytes(&self) -> [u8; AMOUNT_BYTES] {
        self.0.serialize()
    }

    pub fn from_bytes(bytes: [u8; AMOUNT_BYTES]) -> Result<Self, AmountError> {
        // Bits 16..24 of the flags word carry the scale; rust_decimal caps it at 28.
        let scale = bytes[2];
        if scale > 28 || bytes[0] != 0 || bytes[1] != 0 || bytes[3] & 0x7f != 0 {
            return Err(AmountError::Invalid("malformed binary amount".to_string()));
        }
        let amount = Self::new(Decimal::deserialize(bytes))?;
        if amount.to_bytes() != bytes {
            return Err(AmountError::Invalid(
                "binary amount is not in canonical form".to_string(),
            ));
        }
        Ok(amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !AMOUNT_REGEX.is_match(s) {
            return Err(AmountError::Invalid(s.to_string()));
        }
        let value = Decimal::from_str_exact(s).map_err(|_| AmountError::Invalid(s.to_string()))?;
        Self::new(value)
    }
}

impl From<u64> for Amount {
    fn from(units: u64) -> Self {
        Self::from_units(units)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_is_default() {
        assert_eq!(Amount::default(), Amount::ZERO);
        assert_eq!(Amount::ZERO.to_string(), "0");
        assert!(Amount::ZERO.is_zero());
    }

    #[test]
    fn parse_normalises_trailing_zeros() {
        let a: Amount = "12.500".parse().unwrap();
        assert_eq!(a.to_string(), "12.5");
        assert_eq!(a, "12.5".parse().unwrap());
    }

    #[test]
    fn parse_rejects_non_canonical_text() {
        for bad in ["", "-1", "+1", "1e5", " 1", "1.", ".5", "abc", "1,5"] {
            assert!(bad.parse::<Amount>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn subtraction_underflow_is_rejected() {
        let a = Amount::from(100);
        let b = Amount::from(150);
        let err = a.checked_sub(b).unwrap_err();
        assert!(matches!(err, AmountError::Underflow { .. }));
        assert_eq!(b.checked_sub(a).unwrap(), Amount::from(50));
        assert_eq!(a.checked_sub(a).unwrap(), Amount::ZERO);
    }

    #[test]
    fn addition_overflow_is_rejected() {
        let max = Amount::new(Decimal::MAX).unwrap();
        let err = max.checked_add(Amount::from(1)).unwrap_err();
        assert!(matches!(err, AmountError::Overflow { .. }));
    }

    #[test]
    fn negative_decimal_rejected() {
        assert_eq!(
            Amount::new(Decimal::NEGATIVE_ONE).unwrap_err(),
            AmountError::Negative
        );
        // Negative zero collapses to zero.
        let neg_zero = Decimal::ZERO * Decimal::NEGATIVE_ONE;
        assert_eq!(Amount::new(neg_zero).unwrap(), Amount::ZERO);
    }

    #[test]
    fn values_beyond_u64_round_trip() {
        let big: Amount = "79228162514264337593543950335".parse().unwrap();
        assert!(big > Amount::from(u64::MAX));
        assert_eq!(big.to_string().parse::<Amount>().unwrap(), big);
        assert_eq!(Amount::from_bytes(big.to_bytes()).unwrap(), big);
    }

    #[test]
    fn serde_uses_canonical_string() {
        let a: Amount = "42.10".parse().unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, r#""42.1""#);
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
        assert!(serde_json::from_str::<Amount>(r#""-3""#).is_err());
    }

    #[test]
    fn from_bytes_rejects_negative_encoding() {
        let bytes = Decimal::NEGATIVE_ONE.serialize();
        assert!(Amount::from_bytes(bytes).is_err());
    }

    fn any_amount() -> impl Strategy<Value = Amount> {
        (0u128..(1u128 << 96), 0u32..=28).prop_map(|(mantissa, scale)| {
            let value = Decimal::try_from_i128_with_scale(mantissa as i128, scale)
                .unwrap_or(Decimal::ZERO);
            Amount::new(value).unwrap()
        })
    }

    proptest! {
        #[test]
        fn text_encoding_round_trips(a in any_amount()) {
            let text = a.to_string();
            let back: Amount = text.parse().unwrap();
            prop_assert_eq!(back, a);
            prop_assert_eq!(back.to_bytes(), a.to_bytes());
        }

        #[test]
        fn binary_encoding_round_trips(a in any_amount()) {
            let back = Amount::from_bytes(a.to_bytes()).unwrap();
            prop_assert_eq!(back, a);
            prop_assert_eq!(back.to_string(), a.to_string());
        }

        #[test]
        fn add_then_sub_is_identity(a in any::<u64>(), b in any::<u64>()) {
            let (a, b) = (Amount::from(a), Amount::from(b));
            let sum = a.checked_add(b).unwrap();
            prop_assert_eq!(sum.checked_sub(b).unwrap(), a);
            prop_assert!(sum >= a && sum >= b);
        }
    }
}
