//! Error types

use thiserror::Error;

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount out of range: {0}")]
    AmountOverflow(String),

    #[error("Unsupported token decimals: {0}")]
    UnsupportedDecimals(u8),

    #[error("Token not found: {0}")]
    TokenNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("History I/O error: {0}")]
    HistoryIo(#[from] std::io::Error),
}

/// Quote provider and token list errors
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("No route found for {input} -> {output}")]
    NoRouteFound { input: String, output: String },

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Token list unavailable: {0}")]
    TokenListUnavailable(String),
}

impl FeedError {
    pub fn is_rate_limited(&self) -> bool {
        match self {
            FeedError::RateLimited => true,
            FeedError::Status { status, .. } => *status == 429,
            _ => false,
        }
    }
}

/// Execution errors
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error("Swap submission rejected: {label}")]
    SubmissionRejected { label: String, detail: String },

    #[error("Transaction {tx_id} not confirmed after {attempts} attempts")]
    ConfirmationTimeout { tx_id: String, attempts: u32 },

    #[error("Confirmation of {tx_id} abandoned on shutdown")]
    ConfirmationAbandoned { tx_id: String, attempts: u32 },

    #[error("Transaction {tx_id} failed on-chain: {reason}")]
    FailedOnChain { tx_id: String, reason: String },

    #[error("Transaction {tx_id} settled without a positive balance change")]
    Unprofitable { tx_id: String },

    #[error("Balance shortfall: available {available}, required {required}")]
    BalanceShortfall { available: String, required: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

impl ExecutionError {
    /// Short classification stored in trade history
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::SubmissionRejected { .. } => "SubmissionRejected",
            ExecutionError::ConfirmationTimeout { .. } => "ConfirmationTimeout",
            ExecutionError::ConfirmationAbandoned { .. } => "Unknown",
            ExecutionError::FailedOnChain { .. } => "FailedOnChain",
            ExecutionError::Unprofitable { .. } => "Unprofitable",
            ExecutionError::BalanceShortfall { .. } => "BalanceShortfall",
            ExecutionError::Rpc(_) => "Rpc",
            ExecutionError::Signing(_) => "Signing",
        }
    }

    /// Funds state cannot be determined from what was observed
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(
            self,
            ExecutionError::ConfirmationTimeout { .. } | ExecutionError::ConfirmationAbandoned { .. }
        )
    }
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
pub type FeedResult<T> = Result<T, FeedError>;
pub type ExecutionResult<T> = Result<T, ExecutionError>;
