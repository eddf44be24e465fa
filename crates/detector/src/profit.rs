//! Profit evaluation

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use jup_arb_core::{Amount, CoreError, CoreResult};

/// Percentage gain of `amount_out` over `amount_in`:
/// `((amount_out - amount_in) / amount_in) * 100`.
///
/// Both amounts must be in the same token's smallest unit. A zero input is
/// rejected with [`CoreError::InvalidAmount`].
pub fn profit_percent(amount_in: Amount, amount_out: Amount) -> CoreResult<f64> {
    if amount_in.is_zero() {
        return Err(CoreError::InvalidAmount("input amount is zero".into()));
    }
    profit_percent_decimal(amount_in.to_raw_decimal()?, amount_out.to_raw_decimal()?)
}

/// Same as [`profit_percent`] for values already scaled to a common base
pub fn profit_percent_decimal(amount_in: Decimal, amount_out: Decimal) -> CoreResult<f64> {
    if amount_in <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(format!(
            "input amount must be positive, got {}",
            amount_in
        )));
    }
    if amount_out < Decimal::ZERO {
        return Err(CoreError::InvalidAmount(format!(
            "output amount must not be negative, got {}",
            amount_out
        )));
    }

    let ratio = (amount_out - amount_in)
        .checked_div(amount_in)
        .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(|| CoreError::AmountOverflow(format!("{} / {}", amount_out, amount_in)))?;

    ratio
        .to_f64()
        .ok_or_else(|| CoreError::AmountOverflow(ratio.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn amt(v: u64) -> Amount {
        Amount::from_u64(v)
    }

    #[test]
    fn test_known_values() {
        assert_eq!(profit_percent(amt(100), amt(110)).unwrap(), 10.0);
        assert_eq!(profit_percent(amt(100), amt(100)).unwrap(), 0.0);
        assert_eq!(profit_percent(amt(100), amt(90)).unwrap(), -10.0);
        assert_eq!(profit_percent(amt(1_000_000), amt(1_010_000)).unwrap(), 1.0);
    }

    #[test]
    fn test_zero_input_is_invalid() {
        for out in [0u64, 1, 1_000_000] {
            let err = profit_percent(amt(0), amt(out)).unwrap_err();
            assert!(matches!(err, CoreError::InvalidAmount(_)));
        }
    }

    #[test]
    fn test_decimal_inputs() {
        // 1.5 -> 1.515 human units of the same token
        let pct = profit_percent_decimal(Decimal::new(15, 1), Decimal::new(1515, 3)).unwrap();
        assert!((pct - 1.0).abs() < 1e-12);
        assert!(profit_percent_decimal(Decimal::ZERO, Decimal::ONE).is_err());
    }

    proptest! {
        #[test]
        fn prop_scale_invariant(a in 1u64..1_000_000_000, b in 0u64..2_000_000_000, k in 1u64..1_000_000) {
            let base = profit_percent(amt(a), amt(b)).unwrap();
            let scaled = profit_percent(amt(a * k), amt(b * k)).unwrap();
            prop_assert!((base - scaled).abs() <= 1e-9 * base.abs().max(1.0));
        }
    }
}
