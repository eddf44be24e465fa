//! On-chain confirmation with bounded, jittered retry

use rand::Rng;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use jup_arb_core::ConfirmationConfig;

use crate::traits::{BalanceChange, LookupResult, TransactionLookup};

/// Exponential backoff between lookups
///
/// Delay before retry `n` (1-based) is `min(r * min_backoff * factor^(n-1), max_backoff)`
/// with `r` uniform in `[1, 2)` when randomized and `1` otherwise.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub factor: f64,
    pub randomize: bool,
}

impl RetryPolicy {
    pub fn delay_for<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let r = if self.randomize { rng.gen_range(1.0..2.0) } else { 1.0 };
        let exp = self.factor.powi(attempt.saturating_sub(1) as i32);
        let ms = (r * self.min_backoff.as_millis() as f64 * exp).round();
        let capped = ms.min(self.max_backoff.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

impl From<&ConfirmationConfig> for RetryPolicy {
    fn from(config: &ConfirmationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            min_backoff: Duration::from_millis(config.min_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            factor: config.backoff_factor,
            randomize: config.randomize,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ConfirmationConfig::default())
    }
}

/// Classified confirmation result
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    /// Found with a positive balance change of the traded token
    Confirmed { change: BalanceChange, attempts: u32 },
    /// Found, execution failed on-chain
    FailedOnChain { reason: String, attempts: u32 },
    /// Found, settled without a gain
    Unprofitable { change: BalanceChange, attempts: u32 },
    /// Never found within the attempt budget
    TimedOut { attempts: u32 },
    /// Shutdown requested while waiting
    Abandoned { attempts: u32 },
}

impl Confirmation {
    pub fn attempts(&self) -> u32 {
        match self {
            Confirmation::Confirmed { attempts, .. }
            | Confirmation::FailedOnChain { attempts, .. }
            | Confirmation::Unprofitable { attempts, .. }
            | Confirmation::TimedOut { attempts }
            | Confirmation::Abandoned { attempts } => *attempts,
        }
    }
}

/// Resolves once `true` is observed on the shutdown channel
pub async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            // sender gone, no stop can arrive
            std::future::pending::<()>().await;
        }
    }
}

/// Poll `lookup` for `tx_id` until it resolves, the attempt budget runs out
/// or shutdown is requested.
pub async fn await_confirmation<L: TransactionLookup + ?Sized>(
    lookup: &L,
    tx_id: &str,
    owner: &str,
    mint: &str,
    policy: &RetryPolicy,
    shutdown: &mut watch::Receiver<bool>,
) -> Confirmation {
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if *shutdown.borrow() {
            return Confirmation::Abandoned {
                attempts: attempt - 1,
            };
        }

        debug!(tx_id, attempt, max_attempts, "Transaction lookup");
        match lookup.get_transaction_result(tx_id, owner).await {
            Ok(LookupResult::Found {
                on_chain_error: Some(reason),
                ..
            }) => {
                warn!(tx_id, %reason, "Transaction failed on-chain");
                return Confirmation::FailedOnChain {
                    reason,
                    attempts: attempt,
                };
            }
            Ok(result @ LookupResult::Found { .. }) => match result.change_for(mint) {
                Some(change) if change.gain().is_some() => {
                    info!(tx_id, attempt, pre = %change.pre, post = %change.post, "Transaction confirmed");
                    return Confirmation::Confirmed {
                        change: change.clone(),
                        attempts: attempt,
                    };
                }
                Some(change) => {
                    warn!(tx_id, pre = %change.pre, post = %change.post, "Transaction settled without gain");
                    return Confirmation::Unprofitable {
                        change: change.clone(),
                        attempts: attempt,
                    };
                }
                None => debug!(tx_id, "Transaction found, balance change not indexed yet"),
            },
            Ok(LookupResult::NotYetFound) => debug!(tx_id, attempt, "Transaction not found yet"),
            Err(e) => warn!(tx_id, attempt, "Transaction lookup error: {}", e),
        }

        if attempt == max_attempts {
            break;
        }

        let delay = policy.delay_for(attempt, &mut rand::thread_rng());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop_requested(shutdown) => {
                warn!(tx_id, attempt, "Shutdown during confirmation, abandoning lookup");
                return Confirmation::Abandoned { attempts: attempt };
            }
        }
    }

    warn!(tx_id, max_attempts, "Confirmation attempts exhausted");
    Confirmation::TimedOut {
        attempts: max_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jup_arb_core::{Amount, ExecutionError, ExecutionResult};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicU32, Ordering};

    const MINT: &str = "mint";

    /// Not found for the first `found_on - 1` calls, then `result`
    struct ScriptedLookup {
        calls: AtomicU32,
        found_on: u32,
        result: LookupResult,
    }

    impl ScriptedLookup {
        fn new(found_on: u32, result: LookupResult) -> Self {
            Self {
                calls: AtomicU32::new(0),
                found_on,
                result,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl TransactionLookup for ScriptedLookup {
        async fn get_transaction_result(&self, _tx_id: &str, _owner: &str) -> ExecutionResult<LookupResult> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.found_on {
                Ok(self.result.clone())
            } else if n % 3 == 0 {
                Err(ExecutionError::Rpc("node behind".into()))
            } else {
                Ok(LookupResult::NotYetFound)
            }
        }
    }

    fn found(pre: u64, post: u64) -> LookupResult {
        LookupResult::Found {
            changes: vec![BalanceChange::new(MINT, Amount::from_u64(pre), Amount::from_u64(post))],
            on_chain_error: None,
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[test]
    fn test_backoff_bounds() {
        let p = policy();
        let mut rng = StdRng::seed_from_u64(3);
        for attempt in 1..=30 {
            let d = p.delay_for(attempt, &mut rng);
            assert!(d >= Duration::from_millis(1_000), "attempt {} delay {:?}", attempt, d);
            assert!(d <= Duration::from_millis(4_000), "attempt {} delay {:?}", attempt, d);
        }

        let fixed = RetryPolicy {
            randomize: false,
            ..policy()
        };
        assert_eq!(fixed.delay_for(1, &mut rng), Duration::from_millis(1_000));
        assert_eq!(fixed.delay_for(2, &mut rng), Duration::from_millis(2_000));
        assert_eq!(fixed.delay_for(3, &mut rng), Duration::from_millis(4_000));
        assert_eq!(fixed.delay_for(10, &mut rng), Duration::from_millis(4_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_on_nth_call() {
        let lookup = ScriptedLookup::new(7, found(1_000_000, 1_010_000));
        let (_tx, mut rx) = watch::channel(false);

        let outcome = await_confirmation(&lookup, "sig", "owner", MINT, &policy(), &mut rx).await;
        match outcome {
            Confirmation::Confirmed { change, attempts } => {
                assert_eq!(attempts, 7);
                assert_eq!(change.gain(), Some(Amount::from_u64(10_000)));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(lookup.calls(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_on_last_allowed_call() {
        let lookup = ScriptedLookup::new(30, found(10, 20));
        let (_tx, mut rx) = watch::channel(false);

        let outcome = await_confirmation(&lookup, "sig", "owner", MINT, &policy(), &mut rx).await;
        assert!(matches!(outcome, Confirmation::Confirmed { attempts: 30, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_ceiling() {
        let lookup = ScriptedLookup::new(u32::MAX, LookupResult::NotYetFound);
        let (_tx, mut rx) = watch::channel(false);

        let outcome = await_confirmation(&lookup, "sig", "owner", MINT, &policy(), &mut rx).await;
        assert_eq!(outcome, Confirmation::TimedOut { attempts: 30 });
        assert_eq!(lookup.calls(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_chain_failure_is_terminal() {
        let lookup = ScriptedLookup::new(
            2,
            LookupResult::Found {
                changes: vec![],
                on_chain_error: Some("custom program error: 0x1771".into()),
            },
        );
        let (_tx, mut rx) = watch::channel(false);

        let outcome = await_confirmation(&lookup, "sig", "owner", MINT, &policy(), &mut rx).await;
        assert!(matches!(outcome, Confirmation::FailedOnChain { attempts: 2, .. }));
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_gain_is_unprofitable() {
        let lookup = ScriptedLookup::new(1, found(1_000, 990));
        let (_tx, mut rx) = watch::channel(false);

        let outcome = await_confirmation(&lookup, "sig", "owner", MINT, &policy(), &mut rx).await;
        match outcome {
            Confirmation::Unprofitable { change, attempts } => {
                assert_eq!(attempts, 1);
                assert_eq!(change.loss(), Amount::from_u64(10));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_mint_change_retries() {
        let lookup = ScriptedLookup::new(
            1,
            LookupResult::Found {
                changes: vec![BalanceChange::new("other", Amount::ZERO, Amount::from_u64(5))],
                on_chain_error: None,
            },
        );
        let (_tx, mut rx) = watch::channel(false);
        let short = RetryPolicy {
            max_attempts: 4,
            ..policy()
        };

        let outcome = await_confirmation(&lookup, "sig", "owner", MINT, &short, &mut rx).await;
        assert_eq!(outcome, Confirmation::TimedOut { attempts: 4 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_wait() {
        let lookup = ScriptedLookup::new(u32::MAX, LookupResult::NotYetFound);
        let (tx, mut rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            let _ = tx.send(true);
        });

        let outcome = await_confirmation(&lookup, "sig", "owner", MINT, &policy(), &mut rx).await;
        assert!(matches!(outcome, Confirmation::Abandoned { .. }));
        assert!(lookup.calls() < 30);
    }

    #[tokio::test]
    async fn test_already_stopped_never_looks_up() {
        let lookup = ScriptedLookup::new(1, found(1, 2));
        let (_tx, mut rx) = watch::channel(true);

        let outcome = await_confirmation(&lookup, "sig", "owner", MINT, &policy(), &mut rx).await;
        assert_eq!(outcome, Confirmation::Abandoned { attempts: 0 });
        assert_eq!(lookup.calls(), 0);
    }
}
