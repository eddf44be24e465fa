//! Trade decision gate
//!
//! `Idle -> Evaluating -> Submitting -> Confirming -> {Succeeded, Failed} -> Idle`
//!
//! The gate is the single-flight guard: while a trade is `Submitting` or
//! `Confirming`, every further decision is a skip.

use rand::Rng;
use tracing::{info, warn};

/// Gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Evaluating,
    Submitting,
    Confirming,
    Succeeded,
    Failed,
}

/// Why a cycle did not submit
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    TradeInFlight,
    BelowThreshold { profit: f64, threshold: f64 },
    TradingDisabled,
}

/// Accepted submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitPlan {
    /// Forced by the manual execute override
    pub forced: bool,
    /// Unwind: accept any output regardless of the quote
    pub revert: bool,
    /// Jittered threshold the profit was compared against
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Submit(SubmitPlan),
    Skip(SkipReason),
}

impl GateDecision {
    pub fn is_submit(&self) -> bool {
        matches!(self, GateDecision::Submit(_))
    }
}

/// Trade decision gate with manual overrides
#[derive(Debug, Clone)]
pub struct TradeGate {
    state: GateState,
    trading_enabled: bool,
    force_execute: bool,
    revert: bool,
    jitter_pct: f64,
    last_outcome: Option<GateState>,
}

impl TradeGate {
    pub fn new(trading_enabled: bool) -> Self {
        Self {
            state: GateState::Idle,
            trading_enabled,
            force_execute: false,
            revert: false,
            jitter_pct: 1.0,
            last_outcome: None,
        }
    }

    /// Threshold randomization half-width in percent (1.0 = ±1%)
    pub fn with_jitter(mut self, jitter_pct: f64) -> Self {
        self.jitter_pct = jitter_pct.max(0.0);
        self
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn last_outcome(&self) -> Option<GateState> {
        self.last_outcome
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, GateState::Submitting | GateState::Confirming)
    }

    pub fn trading_enabled(&self) -> bool {
        self.trading_enabled
    }

    /// Flip the global trading toggle, returning the new value
    pub fn toggle_trading(&mut self) -> bool {
        self.trading_enabled = !self.trading_enabled;
        self.trading_enabled
    }

    pub fn request_force_execute(&mut self) {
        self.force_execute = true;
    }

    pub fn request_revert(&mut self) {
        self.revert = true;
    }

    pub fn revert_pending(&self) -> bool {
        self.revert
    }

    /// Enter `Evaluating`. Returns false while a trade is in flight.
    fn begin_evaluation(&mut self) -> bool {
        if self.is_in_flight() {
            return false;
        }
        self.state = GateState::Evaluating;
        true
    }

    /// `threshold * uniform(1 - j, 1 + j)` with `j = jitter_pct / 100`
    pub fn jittered_threshold<R: Rng + ?Sized>(&self, threshold: f64, rng: &mut R) -> f64 {
        if self.jitter_pct == 0.0 {
            return threshold;
        }
        let j = self.jitter_pct / 100.0;
        threshold * rng.gen_range((1.0 - j)..=(1.0 + j))
    }

    /// Decide whether this cycle submits against an already jittered
    /// `threshold` (see [`TradeGate::jittered_threshold`]). On `Submit` the
    /// gate is in `Submitting` until [`TradeGate::complete`] is called.
    pub fn decide(&mut self, simulated_profit: f64, threshold: f64) -> GateDecision {
        if !self.begin_evaluation() {
            return GateDecision::Skip(SkipReason::TradeInFlight);
        }

        let qualifies = self.force_execute || self.revert || simulated_profit >= threshold;
        if !qualifies {
            self.state = GateState::Idle;
            return GateDecision::Skip(SkipReason::BelowThreshold {
                profit: simulated_profit,
                threshold,
            });
        }

        let forced = std::mem::take(&mut self.force_execute);
        if forced {
            info!("Execution forced by manual override");
        }
        if self.revert {
            info!("Revert requested, accepting any output");
        }

        if !(self.trading_enabled || self.revert) {
            self.state = GateState::Idle;
            return GateDecision::Skip(SkipReason::TradingDisabled);
        }

        self.state = GateState::Submitting;
        GateDecision::Submit(SubmitPlan {
            forced,
            revert: self.revert,
            threshold,
        })
    }

    /// Submission accepted, waiting for on-chain confirmation
    pub fn mark_confirming(&mut self) -> bool {
        if self.state != GateState::Submitting {
            return false;
        }
        self.state = GateState::Confirming;
        true
    }

    /// Classify the in-flight trade and release the guard
    pub fn complete(&mut self, succeeded: bool) -> GateState {
        if !self.is_in_flight() {
            warn!(state = ?self.state, "Trade completion with no trade in flight");
            return self.state;
        }

        let outcome = if succeeded {
            GateState::Succeeded
        } else {
            GateState::Failed
        };
        self.state = outcome;
        self.last_outcome = Some(outcome);

        if succeeded && self.revert {
            self.revert = false;
            self.trading_enabled = false;
            warn!("Revert swap succeeded, trading disabled until re-enabled");
        }

        self.state = GateState::Idle;
        outcome
    }
}

impl Default for TradeGate {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_submits_above_threshold() {
        let mut gate = TradeGate::new(true);
        let decision = gate.decide(1.0, 0.5);
        assert!(decision.is_submit());
        assert_eq!(gate.state(), GateState::Submitting);
    }

    #[test]
    fn test_skips_below_threshold() {
        let mut gate = TradeGate::new(true);
        let threshold = gate.jittered_threshold(0.5, &mut rng());
        assert!((0.495..=0.505).contains(&threshold));
        match gate.decide(0.1, threshold) {
            GateDecision::Skip(SkipReason::BelowThreshold { profit, threshold: t }) => {
                assert_eq!(profit, 0.1);
                assert_eq!(t, threshold);
            }
            other => panic!("unexpected decision: {:?}", other),
        }
        assert_eq!(gate.state(), GateState::Idle);
    }

    #[test]
    fn test_threshold_jitter_bounds() {
        let gate = TradeGate::new(true);
        let mut r = rng();
        for _ in 0..1_000 {
            let t = gate.jittered_threshold(2.0, &mut r);
            assert!((1.98..=2.02).contains(&t));
        }
        let exact = TradeGate::new(true).with_jitter(0.0);
        assert_eq!(exact.jittered_threshold(2.0, &mut r), 2.0);
    }

    #[test]
    fn test_single_flight_reentrancy() {
        let mut gate = TradeGate::new(true);
        assert!(gate.decide(5.0, 0.5).is_submit());

        // repeated ticks while submitting
        for _ in 0..10 {
            assert_eq!(
                gate.decide(5.0, 0.5),
                GateDecision::Skip(SkipReason::TradeInFlight)
            );
            assert_eq!(gate.state(), GateState::Submitting);
        }

        assert!(gate.mark_confirming());
        for _ in 0..10 {
            assert_eq!(
                gate.decide(5.0, 0.5),
                GateDecision::Skip(SkipReason::TradeInFlight)
            );
        }
        assert_eq!(gate.state(), GateState::Confirming);

        assert_eq!(gate.complete(true), GateState::Succeeded);
        assert_eq!(gate.state(), GateState::Idle);
        assert!(gate.decide(5.0, 0.5).is_submit());
    }

    #[test]
    fn test_force_execute_is_one_shot() {
        let mut gate = TradeGate::new(true);
        gate.request_force_execute();

        match gate.decide(-3.0, 0.5) {
            GateDecision::Submit(plan) => {
                assert!(plan.forced);
                assert!(!plan.revert);
            }
            other => panic!("unexpected decision: {:?}", other),
        }
        gate.complete(false);

        assert!(!gate.decide(-3.0, 0.5).is_submit());
    }

    #[test]
    fn test_trading_disabled_blocks_profitable_trade() {
        let mut gate = TradeGate::new(false);
        assert_eq!(
            gate.decide(5.0, 0.5),
            GateDecision::Skip(SkipReason::TradingDisabled)
        );
        assert!(gate.toggle_trading());
        assert!(gate.decide(5.0, 0.5).is_submit());
    }

    #[test]
    fn test_revert_overrides_disabled_trading_then_disables() {
        let mut gate = TradeGate::new(false);
        gate.request_revert();

        match gate.decide(-10.0, 0.5) {
            GateDecision::Submit(plan) => assert!(plan.revert),
            other => panic!("unexpected decision: {:?}", other),
        }

        // failed revert keeps the request for the next cycle
        gate.complete(false);
        assert!(gate.revert_pending());
        assert!(gate.decide(-10.0, 0.5).is_submit());

        gate.complete(true);
        assert!(!gate.revert_pending());
        assert!(!gate.trading_enabled());
        assert_eq!(gate.last_outcome(), Some(GateState::Succeeded));
    }

    #[test]
    fn test_complete_without_flight_is_noop() {
        let mut gate = TradeGate::new(true);
        assert_eq!(gate.complete(true), GateState::Idle);
        assert!(!gate.mark_confirming());
        assert_eq!(gate.last_outcome(), None);
    }
}
