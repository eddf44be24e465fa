//! Consecutive failure circuit breaker

use tracing::{error, warn};

use jup_arb_core::RiskConfig;

/// Why the breaker tripped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerTrip {
    BalanceShortfall { count: u32, ceiling: u32 },
    ErrorCeiling { count: u32, ceiling: u32 },
}

impl std::fmt::Display for BreakerTrip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerTrip::BalanceShortfall { count, ceiling } => write!(
                f,
                "balance below trade size {} consecutive times (ceiling {})",
                count, ceiling
            ),
            BreakerTrip::ErrorCeiling { count, ceiling } => {
                write!(f, "{} consecutive failed trades (ceiling {})", count, ceiling)
            }
        }
    }
}

/// Halts trading once consecutive failures cross a ceiling.
///
/// Both counters reset on any success. The trip is reported once; later
/// failures keep counting but return `None`.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    shortfall_ceiling: u32,
    error_ceiling: u32,
    consecutive_shortfalls: u32,
    consecutive_errors: u32,
    tripped: Option<BreakerTrip>,
}

impl CircuitBreaker {
    pub fn new(shortfall_ceiling: u32, error_ceiling: u32) -> Self {
        Self {
            shortfall_ceiling,
            error_ceiling,
            consecutive_shortfalls: 0,
            consecutive_errors: 0,
            tripped: None,
        }
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(config.balance_shortfall_ceiling, config.error_ceiling)
    }

    pub fn consecutive_shortfalls(&self) -> u32 {
        self.consecutive_shortfalls
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn tripped(&self) -> Option<BreakerTrip> {
        self.tripped
    }

    pub fn record_success(&mut self) {
        self.consecutive_shortfalls = 0;
        self.consecutive_errors = 0;
    }

    /// Count a failed trade; `balance_shortfall` is the post-failure balance
    /// re-check result. Returns the trip the first time a ceiling is crossed.
    pub fn record_failure(&mut self, balance_shortfall: bool) -> Option<BreakerTrip> {
        if balance_shortfall {
            self.consecutive_shortfalls += 1;
            warn!(
                count = self.consecutive_shortfalls,
                ceiling = self.shortfall_ceiling,
                "Insufficient balance after failed trade"
            );
        }
        self.consecutive_errors += 1;

        let trip = if self.consecutive_shortfalls > self.shortfall_ceiling {
            Some(BreakerTrip::BalanceShortfall {
                count: self.consecutive_shortfalls,
                ceiling: self.shortfall_ceiling,
            })
        } else if self.consecutive_errors > self.error_ceiling {
            Some(BreakerTrip::ErrorCeiling {
                count: self.consecutive_errors,
                ceiling: self.error_ceiling,
            })
        } else {
            None
        };

        match (trip, self.tripped) {
            (Some(t), None) => {
                error!("Circuit breaker tripped: {}", t);
                self.tripped = Some(t);
                Some(t)
            }
            _ => None,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::from_config(&RiskConfig::default())
    }
}
