//! Submit-and-confirm for one trade

use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use jup_arb_core::{Amount, ExecutionError, ExecutionResult, Quote, TradeDraft, TradeEntry};
use jup_arb_detector::profit_percent;

use crate::confirm::{await_confirmation, Confirmation, RetryPolicy};
use crate::errors::{submission_label, TradeError};
use crate::traits::{BalanceQuery, SwapExecutor, SwapSubmission, TransactionLookup};

/// Swap accepted by the network, result not yet verified
#[derive(Debug)]
pub struct PendingTrade {
    pub submission: SwapSubmission,
    started: Instant,
}

impl PendingTrade {
    pub fn tx_id(&self) -> &str {
        &self.submission.tx_id
    }
}

/// Executes swaps and verifies their result on-chain
pub struct TradeExecutor {
    swap: Arc<dyn SwapExecutor>,
    lookup: Arc<dyn TransactionLookup>,
    balances: Arc<dyn BalanceQuery>,
    policy: RetryPolicy,
}

impl TradeExecutor {
    pub fn new(
        swap: Arc<dyn SwapExecutor>,
        lookup: Arc<dyn TransactionLookup>,
        balances: Arc<dyn BalanceQuery>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            swap,
            lookup,
            balances,
            policy,
        }
    }

    pub fn owner(&self) -> String {
        self.swap.owner()
    }

    pub async fn balance(&self, mint: &str) -> ExecutionResult<Amount> {
        self.balances.get_token_balance(&self.owner(), mint).await
    }

    /// Post-failure balance re-check. A query error is logged and not
    /// counted as a shortfall.
    pub async fn balance_shortfall(&self, mint: &str, required: Amount) -> Option<ExecutionError> {
        match self.balance(mint).await {
            Ok(available) if available < required => Some(ExecutionError::BalanceShortfall {
                available: available.to_string(),
                required: required.to_string(),
            }),
            Ok(available) => {
                info!(%available, %required, "Balance check passed");
                None
            }
            Err(e) => {
                warn!("Balance check failed: {}", e);
                None
            }
        }
    }

    /// Submit the swap for `quote` and classify it from the on-chain result.
    ///
    /// The swap API's reported output is ignored; the recorded output is
    /// `in_amount` plus the owner's verified balance change of the traded token.
    pub async fn submit_and_confirm(
        &self,
        quote: &Quote,
        draft: &TradeDraft,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<TradeEntry, TradeError> {
        let pending = self.submit(quote, draft).await?;
        self.confirm(pending, quote, draft, shutdown).await
    }

    /// Submission only. Rejections are terminal and never retried.
    pub async fn submit(&self, quote: &Quote, draft: &TradeDraft) -> Result<PendingTrade, TradeError> {
        let started = Instant::now();

        match self.swap.submit(quote).await {
            Ok(submission) => {
                info!(
                    tx_id = %submission.tx_id,
                    reported_out = ?submission.reported_out_amount.map(|a| a.to_string()),
                    "Swap submitted, verifying on-chain"
                );
                Ok(PendingTrade { submission, started })
            }
            Err(error) => {
                warn!(error = %error, "Swap submission rejected");
                let entry = draft.failed(
                    None,
                    Amount::ZERO,
                    None,
                    error.kind(),
                    error.to_string(),
                    started.elapsed().as_millis() as u64,
                );
                Err(TradeError { entry, error })
            }
        }
    }

    /// Wait for the on-chain result of a submitted swap and classify it
    pub async fn confirm(
        &self,
        pending: PendingTrade,
        quote: &Quote,
        draft: &TradeDraft,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<TradeEntry, TradeError> {
        let PendingTrade { submission, started } = pending;
        let elapsed_ms = || started.elapsed().as_millis() as u64;

        let owner = self.owner();
        let confirmation = await_confirmation(
            self.lookup.as_ref(),
            &submission.tx_id,
            &owner,
            &quote.output_mint,
            &self.policy,
            shutdown,
        )
        .await;

        let tx_id = submission.tx_id;
        let in_amount = draft.in_amount;

        match confirmation {
            Confirmation::Confirmed { change, attempts } => {
                let gain = change.gain().unwrap_or(Amount::ZERO);
                let out_amount = in_amount.saturating_add(gain);
                let actual = profit_percent(in_amount, out_amount).unwrap_or(0.0);
                info!(%tx_id, attempts, %out_amount, actual_profit_pct = actual, "Trade succeeded");
                Ok(draft.succeeded(tx_id, out_amount, actual, elapsed_ms()))
            }
            Confirmation::Unprofitable { change, .. } => {
                let out_amount = in_amount.saturating_sub(change.loss());
                let actual = profit_percent(in_amount, out_amount).ok();
                let error = ExecutionError::Unprofitable { tx_id: tx_id.clone() };
                let entry = draft.failed(
                    Some(tx_id),
                    out_amount,
                    actual,
                    error.kind(),
                    error.to_string(),
                    elapsed_ms(),
                );
                Err(TradeError { entry, error })
            }
            Confirmation::FailedOnChain { reason, .. } => {
                let label = submission_label(&reason);
                let error = ExecutionError::FailedOnChain {
                    tx_id: tx_id.clone(),
                    reason: format!("{} ({})", label, reason),
                };
                Err(self.failure(draft, tx_id, error, elapsed_ms()))
            }
            Confirmation::TimedOut { attempts } => {
                let error = ExecutionError::ConfirmationTimeout {
                    tx_id: tx_id.clone(),
                    attempts,
                };
                Err(self.failure(draft, tx_id, error, elapsed_ms()))
            }
            Confirmation::Abandoned { attempts } => {
                let error = ExecutionError::ConfirmationAbandoned {
                    tx_id: tx_id.clone(),
                    attempts,
                };
                Err(self.failure(draft, tx_id, error, elapsed_ms()))
            }
        }
    }

    fn failure(&self, draft: &TradeDraft, tx_id: String, error: ExecutionError, duration_ms: u64) -> TradeError {
        let entry = draft.failed(
            Some(tx_id),
            Amount::ZERO,
            None,
            error.kind(),
            error.to_string(),
            duration_ms,
        );
        TradeError { entry, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{BalanceChange, LookupResult};
    use chrono::Utc;
    use jup_arb_core::{TradeSide, USDC_MINT};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct MockSwap {
        result: ExecutionResult<SwapSubmission>,
        submits: AtomicU32,
    }

    #[async_trait::async_trait]
    impl SwapExecutor for MockSwap {
        async fn submit(&self, _quote: &Quote) -> ExecutionResult<SwapSubmission> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }

        fn owner(&self) -> String {
            "owner".to_string()
        }
    }

    struct MockLookup {
        results: Mutex<Vec<LookupResult>>,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl TransactionLookup for MockLookup {
        async fn get_transaction_result(&self, _tx_id: &str, owner: &str) -> ExecutionResult<LookupResult> {
            assert_eq!(owner, "owner");
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                Ok(LookupResult::NotYetFound)
            } else {
                Ok(results.remove(0))
            }
        }
    }

    struct MockBalance(ExecutionResult<Amount>);

    #[async_trait::async_trait]
    impl BalanceQuery for MockBalance {
        async fn get_token_balance(&self, _owner: &str, _mint: &str) -> ExecutionResult<Amount> {
            self.0.clone()
        }
    }

    fn quote() -> Quote {
        Quote {
            input_mint: USDC_MINT.to_string(),
            output_mint: USDC_MINT.to_string(),
            in_amount: Amount::from_u64(1_000_000),
            out_amount: Amount::from_u64(1_010_000),
            other_amount_threshold: Amount::from_u64(997_880),
            slippage_bps: Decimal::from(120),
            price_impact_pct: 0.0,
            route_hops: vec![],
            context_slot: None,
            payload: serde_json::json!({}),
        }
    }

    fn draft() -> TradeDraft {
        TradeDraft {
            timestamp: Utc::now(),
            side: TradeSide::Buy,
            input_token: USDC_MINT.to_string(),
            output_token: USDC_MINT.to_string(),
            in_amount: Amount::from_u64(1_000_000),
            expected_out_amount: Amount::from_u64(1_010_000),
            expected_profit_pct: 1.0,
            slippage_bps: Decimal::from(120),
        }
    }

    fn executor(
        submit: ExecutionResult<SwapSubmission>,
        lookups: Vec<LookupResult>,
        balance: ExecutionResult<Amount>,
    ) -> (TradeExecutor, Arc<MockLookup>) {
        let lookup = Arc::new(MockLookup {
            results: Mutex::new(lookups),
            calls: AtomicU32::new(0),
        });
        let exec = TradeExecutor::new(
            Arc::new(MockSwap {
                result: submit,
                submits: AtomicU32::new(0),
            }),
            lookup.clone(),
            Arc::new(MockBalance(balance)),
            RetryPolicy::default(),
        );
        (exec, lookup)
    }

    fn submitted() -> ExecutionResult<SwapSubmission> {
        Ok(SwapSubmission {
            tx_id: "5sig".to_string(),
            reported_out_amount: Some(Amount::from_u64(1_010_000)),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_uses_verified_delta() {
        let (exec, lookup) = executor(
            submitted(),
            vec![
                LookupResult::NotYetFound,
                LookupResult::NotYetFound,
                LookupResult::Found {
                    changes: vec![BalanceChange::new(
                        USDC_MINT,
                        Amount::from_u64(5_000_000),
                        Amount::from_u64(5_008_000),
                    )],
                    on_chain_error: None,
                },
            ],
            Ok(Amount::from_u64(5_008_000)),
        );
        let (_tx, mut rx) = watch::channel(false);

        let entry = exec.submit_and_confirm(&quote(), &draft(), &mut rx).await.unwrap();
        assert!(entry.is_success());
        assert_eq!(entry.out_amount, Amount::from_u64(1_008_000));
        assert!((entry.actual_profit_pct.unwrap() - 0.8).abs() < 1e-9);
        assert_eq!(entry.tx_id.as_deref(), Some("5sig"));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_submission_error_is_terminal() {
        let (exec, lookup) = executor(
            Err(ExecutionError::SubmissionRejected {
                label: "Slippage Tolerance Exceeded".into(),
                detail: "custom program error: 0x1771".into(),
            }),
            vec![],
            Ok(Amount::ZERO),
        );
        let (_tx, mut rx) = watch::channel(false);

        let err = exec.submit_and_confirm(&quote(), &draft(), &mut rx).await.unwrap_err();
        assert_eq!(err.entry.error_kind.as_deref(), Some("SubmissionRejected"));
        assert!(err.entry.tx_id.is_none());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_recorded() {
        let (exec, lookup) = executor(submitted(), vec![], Ok(Amount::ZERO));
        let (_tx, mut rx) = watch::channel(false);

        let err = exec.submit_and_confirm(&quote(), &draft(), &mut rx).await.unwrap_err();
        assert!(matches!(err.error, ExecutionError::ConfirmationTimeout { attempts: 30, .. }));
        assert!(err.error.is_outcome_unknown());
        assert_eq!(err.entry.error_kind.as_deref(), Some("ConfirmationTimeout"));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_chain_failure_labelled() {
        let (exec, _) = executor(
            submitted(),
            vec![LookupResult::Found {
                changes: vec![],
                on_chain_error: Some("InstructionError(3, Custom(6001))".into()),
            }],
            Ok(Amount::ZERO),
        );
        let (_tx, mut rx) = watch::channel(false);

        let err = exec.submit_and_confirm(&quote(), &draft(), &mut rx).await.unwrap_err();
        match &err.error {
            ExecutionError::FailedOnChain { reason, .. } => {
                assert!(reason.starts_with("Slippage Tolerance Exceeded"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unprofitable_records_loss() {
        let (exec, _) = executor(
            submitted(),
            vec![LookupResult::Found {
                changes: vec![BalanceChange::new(
                    USDC_MINT,
                    Amount::from_u64(5_000_000),
                    Amount::from_u64(4_990_000),
                )],
                on_chain_error: None,
            }],
            Ok(Amount::ZERO),
        );
        let (_tx, mut rx) = watch::channel(false);

        let err = exec.submit_and_confirm(&quote(), &draft(), &mut rx).await.unwrap_err();
        assert_eq!(err.entry.error_kind.as_deref(), Some("Unprofitable"));
        assert_eq!(err.entry.out_amount, Amount::from_u64(990_000));
        assert!((err.entry.actual_profit_pct.unwrap() + 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_records_unknown() {
        let (exec, _) = executor(submitted(), vec![], Ok(Amount::ZERO));
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            let _ = tx.send(true);
        });

        let err = exec.submit_and_confirm(&quote(), &draft(), &mut rx).await.unwrap_err();
        assert!(matches!(err.error, ExecutionError::ConfirmationAbandoned { .. }));
        assert_eq!(err.entry.error_kind.as_deref(), Some("Unknown"));
        assert_eq!(err.entry.tx_id.as_deref(), Some("5sig"));
    }

    #[tokio::test]
    async fn test_balance_shortfall_check() {
        let (exec, _) = executor(submitted(), vec![], Ok(Amount::from_u64(999_999)));
        let shortfall = exec.balance_shortfall(USDC_MINT, Amount::from_u64(1_000_000)).await;
        assert!(matches!(shortfall, Some(ExecutionError::BalanceShortfall { .. })));

        let (exec, _) = executor(submitted(), vec![], Ok(Amount::from_u64(1_000_000)));
        assert!(exec.balance_shortfall(USDC_MINT, Amount::from_u64(1_000_000)).await.is_none());

        let (exec, _) = executor(submitted(), vec![], Err(ExecutionError::Rpc("down".into())));
        assert!(exec.balance_shortfall(USDC_MINT, Amount::from_u64(1)).await.is_none());
    }
}
