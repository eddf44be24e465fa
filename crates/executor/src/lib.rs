//! Swap execution and on-chain confirmation
//!
//! Features:
//! - Collaborator traits for swap submission, transaction lookup and balances
//! - Solana RPC implementations with backup-RPC lookup
//! - Bounded, jittered confirmation retry with a three-way outcome
//! - Consecutive failure circuit breaker
//! - `submit_and_confirm` producing verified trade history entries

pub mod traits;
pub mod errors;
pub mod confirm;
pub mod breaker;
pub mod trade;
pub mod solana;

pub use traits::{BalanceChange, BalanceQuery, LookupResult, SwapExecutor, SwapSubmission, TransactionLookup};
pub use errors::{submission_label, TradeError};
pub use confirm::{await_confirmation, stop_requested, Confirmation, RetryPolicy};
pub use breaker::{BreakerTrip, CircuitBreaker};
pub use trade::{PendingTrade, TradeExecutor};
pub use solana::{check_rpc, load_keypair, rpc_client, SolanaBalances, SolanaLookup, SolanaSwapExecutor};
