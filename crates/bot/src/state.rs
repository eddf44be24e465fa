//! Run state owned by the polling loop
//!
//! Nothing outside the loop mutates this; collaborators get values, not
//! references into it.

use std::time::Instant;
use tracing::info;

use jup_arb_core::{
    Amount, BotConfig, CoreResult, Token, TradeEntry, TradeHistory, TradeSide, TradeSizeStrategy,
};
use jup_arb_detector::{profit_percent, TradeGate};
use jup_arb_executor::CircuitBreaker;
use jup_arb_price_feed::RateLimiter;

/// Success/failure counts for one trade side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideStats {
    pub success: u64,
    pub failed: u64,
}

/// Run statistics
#[derive(Debug, Clone)]
pub struct RunStats {
    started: Instant,
    pub iterations: u64,
    pub max_profit_spotted: Option<f64>,
    pub last_profit_pct: Option<f64>,
    pub buy: SideStats,
    pub sell: SideStats,
}

impl RunStats {
    pub fn new(now: Instant) -> Self {
        Self {
            started: now,
            iterations: 0,
            max_profit_spotted: None,
            last_profit_pct: None,
            buy: SideStats::default(),
            sell: SideStats::default(),
        }
    }

    pub fn record_profit(&mut self, profit_pct: f64) {
        self.last_profit_pct = Some(profit_pct);
        if self.max_profit_spotted.map_or(true, |max| profit_pct > max) {
            self.max_profit_spotted = Some(profit_pct);
        }
    }

    pub fn record_trade(&mut self, entry: &TradeEntry) {
        let side = match entry.side {
            TradeSide::Buy => &mut self.buy,
            TradeSide::Sell => &mut self.sell,
        };
        if entry.is_success() {
            side.success += 1;
        } else {
            side.failed += 1;
        }
    }

    pub fn iterations_per_minute(&self, now: Instant) -> f64 {
        let minutes = now.saturating_duration_since(self.started).as_secs_f64() / 60.0;
        if minutes <= 0.0 {
            return 0.0;
        }
        self.iterations as f64 / minutes
    }
}

/// Everything the loop carries between cycles
#[derive(Debug)]
pub struct RunState {
    /// Cycles since start or the last token rotation
    pub iteration: u64,
    pub gate: TradeGate,
    pub breaker: CircuitBreaker,
    pub rate_limiter: RateLimiter,
    pub history: TradeHistory,
    pub stats: RunStats,
    strategy: TradeSizeStrategy,
    token: Token,
    rotation: Vec<Token>,
    rotation_index: usize,
    trade_amount: Amount,
    initial_amount: Amount,
}

impl RunState {
    /// `rotation` lists the tokens `rotate` cycles through after `token`
    pub fn new(config: &BotConfig, token: Token, rotation: Vec<Token>, now: Instant) -> CoreResult<Self> {
        let trade_amount = token.to_amount(config.execution.trade_size)?;

        let history = match &config.trade_history_path {
            Some(path) => TradeHistory::with_sink(path),
            None => TradeHistory::new(),
        };

        let mut cycle = vec![token.clone()];
        cycle.extend(rotation.into_iter().filter(|t| t.address != token.address));

        Ok(Self {
            iteration: 0,
            gate: TradeGate::new(config.execution.trading_enabled)
                .with_jitter(config.detection.threshold_jitter_pct),
            breaker: CircuitBreaker::from_config(&config.risk),
            rate_limiter: RateLimiter::new(
                config.rate_limit.clone(),
                config.detection.min_interval(),
                now,
            ),
            history,
            stats: RunStats::new(now),
            strategy: config.execution.trade_size_strategy,
            token,
            rotation: cycle,
            rotation_index: 0,
            trade_amount,
            initial_amount: trade_amount,
        })
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Amount traded next cycle, in smallest units of the active token
    pub fn trade_amount(&self) -> Amount {
        self.trade_amount
    }

    pub fn initial_amount(&self) -> Amount {
        self.initial_amount
    }

    /// Account for a verified successful trade
    pub fn record_success(&mut self, entry: &TradeEntry) {
        if self.strategy == TradeSizeStrategy::Cumulative {
            self.trade_amount = entry.out_amount;
        }
    }

    /// Running balance against the initial size; only meaningful for
    /// the cumulative strategy
    pub fn cumulative_profit_pct(&self) -> Option<f64> {
        profit_percent(self.initial_amount, self.trade_amount).ok()
    }

    /// Switch to the next token in the rotation list. Returns `None` when
    /// there is nothing to rotate to.
    pub fn rotate(&mut self, now: Instant) -> CoreResult<Option<&Token>> {
        if self.rotation.len() < 2 {
            return Ok(None);
        }

        let next_index = (self.rotation_index + 1) % self.rotation.len();
        let next = self.rotation[next_index].clone();

        let size = self.token.to_decimal(self.trade_amount)?;
        let amount = next.to_amount(size)?;

        info!(
            from = %self.token.label(),
            to = %next.label(),
            trade_size = %size,
            "Rotating traded token"
        );

        self.rotation_index = next_index;
        self.token = next;
        self.trade_amount = amount;
        self.initial_amount = amount;
        self.iteration = 0;
        self.rate_limiter.reset_window(now);

        Ok(Some(&self.token))
    }
}
