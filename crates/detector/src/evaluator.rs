//! Per-cycle quote evaluation

use rust_decimal::Decimal;
use serde::Serialize;

use jup_arb_core::{CoreError, CoreResult, DetectionConfig, ExecutionConfig, Quote};

use crate::profit::profit_percent;
use crate::slippage::SlippagePolicy;

/// Evaluated quote, ready for the gate
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub profit_pct: f64,
    pub slippage_bps: Decimal,
    /// Quote with its minimum output recomputed for `slippage_bps`
    pub quote: Quote,
}

impl Evaluation {
    /// Quote to hand to the executor. A revert accepts any output.
    pub fn executable_quote(&self, revert: bool) -> Quote {
        if revert {
            self.quote.accept_any_output()
        } else {
            self.quote.clone()
        }
    }
}

/// Profit + slippage evaluation for same-token round trips
#[derive(Debug, Clone)]
pub struct QuoteEvaluator {
    policy: SlippagePolicy,
    min_profit_pct: f64,
}

impl QuoteEvaluator {
    pub fn new(policy: SlippagePolicy, min_profit_pct: f64) -> Self {
        Self {
            policy,
            min_profit_pct,
        }
    }

    pub fn from_config(execution: &ExecutionConfig, detection: &DetectionConfig) -> Self {
        Self::new(
            SlippagePolicy::new(execution.slippage_bps, execution.adaptive_slippage),
            detection.min_profit_pct,
        )
    }

    pub fn min_profit_pct(&self) -> f64 {
        self.min_profit_pct
    }

    pub fn policy(&self) -> &SlippagePolicy {
        &self.policy
    }

    /// Profit and revised slippage for `quote`. `threshold` is the cycle's
    /// jittered minimum profit, the same value the gate compares against.
    pub fn evaluate(&self, quote: &Quote, threshold: f64) -> CoreResult<Evaluation> {
        if !quote.is_round_trip() {
            return Err(CoreError::InvalidAmount(format!(
                "quote is not a round trip: {} -> {}",
                quote.input_mint, quote.output_mint
            )));
        }

        let profit_pct = profit_percent(quote.in_amount, quote.out_amount)?;
        let slippage_bps = self.policy.revise(profit_pct, threshold);

        Ok(Evaluation {
            profit_pct,
            slippage_bps,
            quote: quote.with_slippage(slippage_bps),
        })
    }
}
