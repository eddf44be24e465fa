//! Profitability detection and trade gating
//!
//! Features:
//! - Profit percentage from same-scale amounts
//! - Adaptive slippage widening on comfortable spreads
//! - Single-flight trade decision gate with threshold jitter
//! - One-call quote evaluation for the polling loop

pub mod profit;
pub mod slippage;
pub mod gate;
pub mod evaluator;

pub use profit::profit_percent;
pub use slippage::{adaptive_slippage, SlippagePolicy};
pub use gate::{GateDecision, GateState, SkipReason, SubmitPlan, TradeGate};
pub use evaluator::{Evaluation, QuoteEvaluator};
