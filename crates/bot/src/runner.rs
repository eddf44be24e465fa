//! Polling loop
//!
//! One timer drives every cycle: rate-limit admission, quote, evaluation,
//! gate decision and, when gated in, submit-and-confirm. Cycles are awaited
//! inline, so a slow cycle delays the next tick instead of overlapping it.
//! Control commands and rotation ticks are applied between cycles.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use jup_arb_core::{BotConfig, FeedError, QuoteRequest, TradeDraft, TradeEntry, TradeSide};
use jup_arb_detector::{GateDecision, QuoteEvaluator, SkipReason};
use jup_arb_executor::{stop_requested, BreakerTrip, TradeError, TradeExecutor};
use jup_arb_price_feed::{Admission, QuoteProvider};

use crate::control::ControlCommand;
use crate::state::RunState;

/// Why the loop returned
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// Ctrl+C, SIGTERM or a stop command
    Shutdown,
    /// Consecutive failures crossed a ceiling
    CircuitBreaker(BreakerTrip),
}

/// Result of one polling cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Still cooling down after a provider 429
    Throttled,
    /// Provider answered 429 this cycle
    RateLimited,
    /// No usable quote this cycle
    NoQuote,
    Skipped(SkipReason),
    Traded(TradeEntry),
    Failed(TradeEntry),
    Halted(BreakerTrip),
}

enum Event {
    Stop,
    Command(Option<ControlCommand>),
    Rotate,
    Tick,
}

pub struct Runner {
    config: BotConfig,
    quotes: Arc<dyn QuoteProvider>,
    executor: TradeExecutor,
    evaluator: QuoteEvaluator,
    state: RunState,
    rng: StdRng,
}

impl Runner {
    pub fn new(config: BotConfig, quotes: Arc<dyn QuoteProvider>, executor: TradeExecutor, state: RunState) -> Self {
        let evaluator = QuoteEvaluator::from_config(&config.execution, &config.detection);
        Self {
            config,
            quotes,
            executor,
            evaluator,
            state,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic threshold jitter
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RunState {
        &mut self.state
    }

    /// Run until shutdown or a circuit-breaker trip
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<ControlCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) -> StopReason {
        let mut delay = self.state.rate_limiter.current_delay();
        let mut ticker = poll_timer(Instant::now(), delay);
        let mut commands_open = true;

        let rotation_minutes = self.config.tokens.rotation_interval_minutes;
        let mut rotation = (rotation_minutes > 0).then(|| {
            let period = Duration::from_secs(rotation_minutes * 60);
            interval_at(Instant::now() + period, period)
        });

        info!(
            token = %self.state.token().label(),
            amount = %self.state.trade_amount(),
            interval_ms = delay.as_millis() as u64,
            trading_enabled = self.state.gate.trading_enabled(),
            "Polling loop started"
        );

        let reason = loop {
            let event = tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => Event::Stop,
                cmd = commands.recv(), if commands_open => Event::Command(cmd),
                _ = next_rotation(&mut rotation) => Event::Rotate,
                _ = ticker.tick() => Event::Tick,
            };

            match event {
                Event::Stop => {
                    info!("Shutdown requested, stopping polling loop");
                    break StopReason::Shutdown;
                }
                Event::Command(None) => commands_open = false,
                Event::Command(Some(command)) => {
                    if let Some(reason) = self.apply_command(command) {
                        break reason;
                    }
                }
                Event::Rotate => self.rotate_token(),
                Event::Tick => {
                    if let CycleOutcome::Halted(trip) = self.run_cycle(&mut shutdown).await {
                        break StopReason::CircuitBreaker(trip);
                    }
                    let next = self.state.rate_limiter.current_delay();
                    if next != delay {
                        debug!(from_ms = delay.as_millis() as u64, to_ms = next.as_millis() as u64, "Poll interval changed");
                        delay = next;
                        ticker = poll_timer(Instant::now() + delay, delay);
                    }
                }
            }
        };

        self.log_summary();
        reason
    }

    /// Apply a manual command. Returns a stop reason for `Stop`.
    pub fn apply_command(&mut self, command: ControlCommand) -> Option<StopReason> {
        match command {
            ControlCommand::ForceExecute => {
                info!("Force execute requested");
                self.state.gate.request_force_execute();
            }
            ControlCommand::Revert => {
                warn!("Revert requested");
                self.state.gate.request_revert();
            }
            ControlCommand::ToggleTrading => {
                let enabled = self.state.gate.toggle_trading();
                info!(enabled, "Trading toggled");
            }
            ControlCommand::RotateToken => self.rotate_token(),
            ControlCommand::Stop => {
                info!("Stop command received");
                return Some(StopReason::Shutdown);
            }
        }
        None
    }

    pub fn rotate_token(&mut self) {
        match self.state.rotate(Instant::now().into_std()) {
            Ok(Some(token)) => info!(token = %token.label(), "Now trading"),
            Ok(None) => warn!("No rotation tokens configured"),
            Err(e) => warn!("Token rotation failed: {}", e),
        }
    }

    /// One polling cycle
    pub async fn run_cycle(&mut self, shutdown: &mut watch::Receiver<bool>) -> CycleOutcome {
        if let Admission::CoolingDown { remaining } = self.state.rate_limiter.admit(Instant::now().into_std()) {
            debug!(remaining_ms = remaining.as_millis() as u64, "Rate limit cooldown, skipping cycle");
            return CycleOutcome::Throttled;
        }

        self.state.iteration += 1;
        self.state.stats.iterations += 1;

        if self.state.gate.is_in_flight() {
            debug!("Trade in flight, skipping cycle");
            return CycleOutcome::Skipped(SkipReason::TradeInFlight);
        }

        let token = self.state.token().clone();
        let amount = self.state.trade_amount();
        let request = QuoteRequest::round_trip(&token.address, amount)
            .with_slippage(self.config.execution.slippage_bps);

        let quote = match self.quotes.get_quote(&request).await {
            Ok(quote) => quote,
            Err(e) if e.is_rate_limited() => {
                self.state.rate_limiter.on_rate_limited(Instant::now().into_std());
                return CycleOutcome::RateLimited;
            }
            Err(e @ FeedError::NoRouteFound { .. }) => {
                info!(iteration = self.state.iteration, "{}", e);
                return CycleOutcome::NoQuote;
            }
            Err(e) => {
                warn!(provider = self.quotes.name(), "Quote failed: {}", e);
                return CycleOutcome::NoQuote;
            }
        };

        let threshold = self
            .state
            .gate
            .jittered_threshold(self.evaluator.min_profit_pct(), &mut self.rng);
        let evaluation = match self.evaluator.evaluate(&quote, threshold) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!("Quote rejected: {}", e);
                return CycleOutcome::NoQuote;
            }
        };
        self.state.stats.record_profit(evaluation.profit_pct);

        debug!(
            iteration = self.state.iteration,
            token = %token.symbol,
            in_amount = %quote.in_amount,
            out_amount = %quote.out_amount,
            profit_pct = evaluation.profit_pct,
            slippage_bps = %evaluation.slippage_bps,
            routes = ?quote.route_labels(),
            "Quote evaluated"
        );
        if self.state.iteration % 100 == 0 {
            self.log_summary();
        }

        let decision = self.state.gate.decide(evaluation.profit_pct, threshold);
        let plan = match decision {
            GateDecision::Submit(plan) => plan,
            GateDecision::Skip(reason) => {
                debug!(?reason, "Not trading this cycle");
                return CycleOutcome::Skipped(reason);
            }
        };

        let swap_quote = evaluation.executable_quote(plan.revert);
        let draft = TradeDraft {
            timestamp: Utc::now(),
            side: if plan.revert { TradeSide::Sell } else { TradeSide::Buy },
            input_token: token.address.clone(),
            output_token: token.address.clone(),
            in_amount: swap_quote.in_amount,
            expected_out_amount: swap_quote.out_amount,
            expected_profit_pct: evaluation.profit_pct,
            slippage_bps: evaluation.slippage_bps,
        };

        info!(
            token = %token.label(),
            in_amount = %draft.in_amount,
            expected_out = %draft.expected_out_amount,
            min_out = %swap_quote.other_amount_threshold,
            profit_pct = evaluation.profit_pct,
            threshold_pct = plan.threshold,
            forced = plan.forced,
            revert = plan.revert,
            "Submitting swap"
        );

        // the swap request goes to the same provider as quotes
        self.state.rate_limiter.record_request(Instant::now().into_std());
        let result = match self.executor.submit(&swap_quote, &draft).await {
            Ok(pending) => {
                self.state.gate.mark_confirming();
                self.executor.confirm(pending, &swap_quote, &draft, shutdown).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(entry) => {
                self.state.gate.complete(true);
                self.state.breaker.record_success();
                self.state.record_success(&entry);
                self.record(&entry).await;
                info!(
                    tx_id = ?entry.tx_id,
                    out_amount = %entry.out_amount,
                    actual_profit_pct = ?entry.actual_profit_pct,
                    cumulative_profit_pct = ?self.state.cumulative_profit_pct(),
                    "Trade recorded"
                );
                CycleOutcome::Traded(entry)
            }
            Err(TradeError { entry, error }) => {
                self.state.gate.complete(false);
                if self.config.execution.store_failed_tx_in_history {
                    self.record(&entry).await;
                } else {
                    self.state.stats.record_trade(&entry);
                }
                warn!(kind = error.kind(), outcome_unknown = error.is_outcome_unknown(), "Trade failed: {}", error);

                let shortfall = self
                    .executor
                    .balance_shortfall(&token.address, self.state.trade_amount())
                    .await;
                if let Some(e) = &shortfall {
                    warn!("{}", e);
                }

                match self.state.breaker.record_failure(shortfall.is_some()) {
                    Some(trip) => CycleOutcome::Halted(trip),
                    None => CycleOutcome::Failed(entry),
                }
            }
        }
    }

    async fn record(&mut self, entry: &TradeEntry) {
        self.state.stats.record_trade(entry);
        if let Err(e) = self.state.history.append(entry.clone()).await {
            error!("Failed to write trade history: {}", e);
        }
    }

    fn log_summary(&self) {
        let stats = &self.state.stats;
        info!(
            iterations = stats.iterations,
            per_minute = stats.iterations_per_minute(Instant::now().into_std()),
            max_profit_pct = ?stats.max_profit_spotted,
            buy_ok = stats.buy.success,
            buy_failed = stats.buy.failed,
            sell_ok = stats.sell.success,
            sell_failed = stats.sell.failed,
            cumulative_profit_pct = ?self.state.cumulative_profit_pct(),
            trades = self.state.history.len(),
            "Run summary"
        );
    }
}

fn poll_timer(start: Instant, period: Duration) -> Interval {
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn next_rotation(rotation: &mut Option<Interval>) {
    match rotation {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
