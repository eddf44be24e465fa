//! Adaptive slippage policy

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

/// Raw widening above which only 30% is applied
const AGGRESSIVE_RAW_BPS: u32 = 500;

fn round3(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
}

/// Slippage bound (bps) for a quote with simulated `profit` percent.
///
/// Unchanged unless adaptive slippage is on and profit is strictly above the
/// threshold. Otherwise `raw = 100 * (profit - threshold + base / 100)`,
/// scaled by 0.3 when `raw > 500` and by 0.8 otherwise, rounded to 3 places.
pub fn adaptive_slippage(
    profit: f64,
    min_profit_threshold: f64,
    base_slippage_bps: Decimal,
    adaptive_enabled: bool,
) -> Decimal {
    if !adaptive_enabled || !(profit > min_profit_threshold) {
        return base_slippage_bps;
    }

    let (Some(profit), Some(threshold)) =
        (Decimal::from_f64(profit), Decimal::from_f64(min_profit_threshold))
    else {
        return base_slippage_bps;
    };

    let raw = round3(
        Decimal::ONE_HUNDRED * (profit - threshold + base_slippage_bps / Decimal::ONE_HUNDRED),
    );
    let factor = if raw > Decimal::from(AGGRESSIVE_RAW_BPS) {
        Decimal::new(3, 1)
    } else {
        Decimal::new(8, 1)
    };

    round3(factor * raw)
}

/// Configured slippage behaviour
#[derive(Debug, Clone, Copy)]
pub struct SlippagePolicy {
    pub base_bps: u16,
    pub adaptive: bool,
}

impl SlippagePolicy {
    pub fn new(base_bps: u16, adaptive: bool) -> Self {
        Self { base_bps, adaptive }
    }

    pub fn base(&self) -> Decimal {
        Decimal::from(self.base_bps)
    }

    pub fn revise(&self, profit: f64, min_profit_threshold: f64) -> Decimal {
        let revised = adaptive_slippage(profit, min_profit_threshold, self.base(), self.adaptive);
        if revised != self.base() {
            debug!(
                base_bps = self.base_bps,
                revised_bps = %revised,
                profit,
                "Adaptive slippage widened"
            );
        }
        revised
    }
}
