//! Quote provider throttling
//!
//! Counts requests in a rolling window. From the caution threshold on, the
//! poll interval is stretched so the remaining window budget lasts until the
//! window resets. An explicit 429 doubles the interval (capped) and pauses
//! requests for a fixed cooldown.

use std::time::{Duration, Instant};
use tracing::{info, warn};

use jup_arb_core::RateLimitConfig;

/// Outcome of [`RateLimiter::admit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Proceed,
    CoolingDown { remaining: Duration },
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    min_interval: Duration,
    request_count: u32,
    window_start: Instant,
    current_delay: Duration,
    cooldown_until: Option<Instant>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, min_interval: Duration, now: Instant) -> Self {
        Self {
            config,
            min_interval,
            request_count: 0,
            window_start: now,
            current_delay: min_interval,
            cooldown_until: None,
        }
    }

    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    /// Interval the polling loop should currently run at
    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.cooldown_until.map(|until| now < until).unwrap_or(false)
    }

    fn window(&self) -> Duration {
        Duration::from_millis(self.config.window_ms)
    }

    /// Account for one provider request at `now`
    pub fn admit(&mut self, now: Instant) -> Admission {
        if let Some(until) = self.cooldown_until {
            if now < until {
                return Admission::CoolingDown {
                    remaining: until - now,
                };
            }
            self.cooldown_until = None;
            self.request_count = 0;
            self.window_start = now;
            info!(
                delay_ms = self.current_delay.as_millis() as u64,
                "Resuming after rate limit cooldown"
            );
        }

        self.record_request(now);
        Admission::Proceed
    }

    /// Count a request that bypasses [`RateLimiter::admit`], such as the
    /// swap call following an admitted quote
    pub fn record_request(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= self.window() {
            self.request_count = 0;
            self.window_start = now;
            self.current_delay = self.min_interval;
            info!("Rate limit window reset");
        }

        self.request_count += 1;

        if self.request_count >= self.config.caution_threshold {
            let elapsed = now.saturating_duration_since(self.window_start);
            let remaining = self.window().saturating_sub(elapsed);
            let slots = self
                .config
                .max_requests_per_window
                .saturating_sub(self.request_count)
                .max(1);
            let spread = div_ceil(remaining, slots);
            let delay = spread.max(self.min_interval);

            if delay != self.current_delay {
                warn!(
                    requests = self.request_count,
                    delay_ms = delay.as_millis() as u64,
                    "Approaching provider rate limit, stretching interval"
                );
            }
            self.current_delay = delay;
        }
    }

    /// Provider answered 429: double the interval and start the cooldown
    pub fn on_rate_limited(&mut self, now: Instant) -> Duration {
        let cap = Duration::from_millis(self.config.max_backoff_ms);
        self.current_delay = (self.current_delay * 2).min(cap);
        self.cooldown_until = Some(now + Duration::from_millis(self.config.cooldown_ms));

        warn!(
            delay_ms = self.current_delay.as_millis() as u64,
            cooldown_ms = self.config.cooldown_ms,
            "Provider rate limit hit, backing off"
        );
        self.current_delay
    }

    /// Fresh window, e.g. after switching the traded token
    pub fn reset_window(&mut self, now: Instant) {
        self.request_count = 0;
        self.window_start = now;
    }
}

fn div_ceil(d: Duration, n: u32) -> Duration {
    let ms = d.as_millis() as u64;
    Duration::from_millis(ms.div_ceil(n as u64))
}
