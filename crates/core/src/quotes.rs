//! Quote and swap route types

use ruint::aliases::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Amount;

/// 100% in basis points
pub const MAX_SLIPPAGE_BPS: u16 = 10_000;

/// One venue/pool in a multi-hop route (informational only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteHop {
    pub label: String,
    pub amm_key: Option<String>,
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: Amount,
    pub out_amount: Amount,
    pub percent: u8,
}

/// A priced estimate for swapping `in_amount` of the input token
///
/// Produced fresh on every poll and never reused once slippage changes:
/// [`Quote::with_slippage`] and [`Quote::accept_any_output`] return a new
/// quote whose minimum output is derived from this quote's own `out_amount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: Amount,
    pub out_amount: Amount,
    pub other_amount_threshold: Amount,
    pub slippage_bps: Decimal,
    pub price_impact_pct: f64,
    pub route_hops: Vec<RouteHop>,
    pub context_slot: Option<u64>,
    /// Provider response as received, handed back when building the swap
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Quote {
    pub fn route_labels(&self) -> Vec<&str> {
        self.route_hops.iter().map(|h| h.label.as_str()).collect()
    }

    /// Input and output token are the same asset
    pub fn is_round_trip(&self) -> bool {
        self.input_mint == self.output_mint
    }

    /// Copy of this quote with a revised slippage bound and the minimum
    /// acceptable output recomputed from `out_amount`.
    ///
    /// Fractional bounds are rounded up to whole basis points first, so the
    /// threshold matches the `slippageBps` the provider receives.
    pub fn with_slippage(&self, slippage_bps: Decimal) -> Quote {
        let bps = clamp_bps(slippage_bps.ceil());
        Quote {
            slippage_bps: bps,
            other_amount_threshold: min_output_for(self.out_amount, bps),
            ..self.clone()
        }
    }

    /// Copy of this quote that accepts any output (position unwind)
    pub fn accept_any_output(&self) -> Quote {
        Quote {
            other_amount_threshold: Amount::ZERO,
            ..self.clone()
        }
    }

    /// Integer basis points for providers that reject fractional values
    pub fn wire_slippage_bps(&self) -> u16 {
        self.slippage_bps
            .ceil()
            .to_u16()
            .unwrap_or(MAX_SLIPPAGE_BPS)
            .min(MAX_SLIPPAGE_BPS)
    }
}

fn clamp_bps(bps: Decimal) -> Decimal {
    bps.max(Decimal::ZERO).min(Decimal::from(MAX_SLIPPAGE_BPS))
}

/// `floor(out_amount * (10000 - bps) / 10000)` with bps kept to 3 decimals
pub fn min_output_for(out_amount: Amount, slippage_bps: Decimal) -> Amount {
    const DENOM: u64 = MAX_SLIPPAGE_BPS as u64 * 1_000;

    let milli_bps = (clamp_bps(slippage_bps) * Decimal::from(1_000))
        .round()
        .to_u64()
        .unwrap_or(DENOM)
        .min(DENOM);

    let kept = U256::from(DENOM - milli_bps);
    let raw = out_amount.raw().saturating_mul(kept) / U256::from(DENOM);
    Amount::new(raw)
}

/// Quote request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub input_mint: String,
    pub output_mint: String,
    pub amount: Amount,
    pub slippage_bps: u16,
}

impl QuoteRequest {
    pub fn new(input_mint: &str, output_mint: &str, amount: Amount) -> Self {
        Self {
            input_mint: input_mint.to_string(),
            output_mint: output_mint.to_string(),
            amount,
            slippage_bps: 100, // 1% default
        }
    }

    /// Same-token round trip
    pub fn round_trip(mint: &str, amount: Amount) -> Self {
        Self::new(mint, mint, amount)
    }

    pub fn with_slippage(mut self, bps: u16) -> Self {
        self.slippage_bps = bps.min(MAX_SLIPPAGE_BPS);
        self
    }
}
