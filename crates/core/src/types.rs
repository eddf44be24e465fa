//! Core type definitions

use ruint::aliases::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::{CoreError, CoreResult};

/// Largest scale `rust_decimal` can represent
const MAX_DECIMAL_SCALE: u8 = 28;

/// Token amount in the token's smallest unit (lamports, micro-USDC, ...)
///
/// All on-chain and quote amounts go through this type. Conversion to a
/// human-readable value is always explicit and takes the token's decimals,
/// so amounts of different scales never meet in one expression by accident.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
    pub const ZERO: Amount = Amount(U256::ZERO);

    pub fn new(raw: U256) -> Self {
        Self(raw)
    }

    pub fn from_u64(raw: u64) -> Self {
        Self(U256::from(raw))
    }

    pub fn raw(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == U256::ZERO
    }

    pub fn to_u64(&self) -> Option<u64> {
        u64::try_from(self.0).ok()
    }

    pub fn to_u128(&self) -> Option<u128> {
        u128::try_from(self.0).ok()
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Exact decimal value of the raw amount (no scaling)
    pub fn to_raw_decimal(&self) -> CoreResult<Decimal> {
        self.to_decimal(0)
    }

    /// Human-readable value for a token with `decimals` decimals
    pub fn to_decimal(&self, decimals: u8) -> CoreResult<Decimal> {
        if decimals > MAX_DECIMAL_SCALE {
            return Err(CoreError::UnsupportedDecimals(decimals));
        }
        let raw = self
            .to_u128()
            .and_then(|v| i128::try_from(v).ok())
            .ok_or_else(|| CoreError::AmountOverflow(self.to_string()))?;

        Decimal::try_from_i128_with_scale(raw, decimals as u32)
            .map_err(|_| CoreError::AmountOverflow(self.to_string()))
    }

    /// Smallest-unit amount from a human-readable value, truncating any
    /// precision beyond `decimals`
    pub fn from_decimal(value: Decimal, decimals: u8) -> CoreResult<Amount> {
        if decimals > MAX_DECIMAL_SCALE {
            return Err(CoreError::UnsupportedDecimals(decimals));
        }
        if value.is_sign_negative() && !value.is_zero() {
            return Err(CoreError::InvalidAmount(value.to_string()));
        }

        let mut scaled = value.round_dp_with_strategy(decimals as u32, RoundingStrategy::ToZero);
        scaled.rescale(decimals as u32);
        if scaled.scale() != decimals as u32 {
            return Err(CoreError::AmountOverflow(value.to_string()));
        }

        let mantissa = scaled
            .mantissa()
            .to_u128()
            .ok_or_else(|| CoreError::InvalidAmount(value.to_string()))?;
        Ok(Amount(U256::from(mantissa)))
    }
}

impl From<u64> for Amount {
    fn from(raw: u64) -> Self {
        Self::from_u64(raw)
    }
}

impl From<U256> for Amount {
    fn from(raw: U256) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidAmount(s.to_string()));
        }
        U256::from_str_radix(trimmed, 10)
            .map(Amount)
            .map_err(|_| CoreError::AmountOverflow(s.to_string()))
    }
}

// Jupiter and the RPC both carry amounts as decimal strings
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or decimal integer string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount::from_u64(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                u64::try_from(v)
                    .map(Amount::from_u64)
                    .map_err(|_| E::custom(format!("negative amount: {}", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Which leg of a trade a history record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_decimal_conversion() {
        // USDC with 6 decimals
        let amount = Amount::from_decimal(Decimal::new(100, 0), 6).unwrap();
        assert_eq!(amount, Amount::from_u64(100_000_000));
        assert_eq!(amount.to_decimal(6).unwrap(), Decimal::new(100, 0));

        // SOL with 9 decimals
        let sol = Amount::from_decimal(Decimal::new(15, 1), 9).unwrap();
        assert_eq!(sol.to_u64(), Some(1_500_000_000));
        assert_eq!(sol.to_decimal(9).unwrap(), Decimal::new(15, 1));
    }

    #[test]
    fn test_from_decimal_truncates_extra_precision() {
        // 1.23456789 with 6 decimals -> 1.234567
        let amount = Amount::from_decimal(Decimal::new(123456789, 8), 6).unwrap();
        assert_eq!(amount.to_u64(), Some(1_234_567));
    }

    #[test]
    fn test_negative_decimal_rejected() {
        let err = Amount::from_decimal(Decimal::new(-1, 0), 6).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount(_)));
    }

    #[test]
    fn test_amount_serde_as_string() {
        let amount = Amount::from_u64(1_010_000);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1010000\"");

        let back: Amount = serde_json::from_str("\"1010000\"").unwrap();
        assert_eq!(back, amount);

        let numeric: Amount = serde_json::from_str("42").unwrap();
        assert_eq!(numeric, Amount::from_u64(42));
    }

    #[test]
    fn test_amount_parse_rejects_garbage() {
        assert!("12a".parse::<Amount>().is_err());
        assert!("".parse::<Amount>().is_err());
        assert!("-5".parse::<Amount>().is_err());
    }

    #[test]
    fn test_checked_sub_underflow() {
        let a = Amount::from_u64(5);
        let b = Amount::from_u64(7);
        assert_eq!(a.checked_sub(b), None);
        assert_eq!(b.checked_sub(a), Some(Amount::from_u64(2)));
    }
}
