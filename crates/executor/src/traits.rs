//! External collaborator interfaces

use jup_arb_core::{Amount, ExecutionResult, Quote};

/// Accepted swap submission
#[derive(Debug, Clone, PartialEq)]
pub struct SwapSubmission {
    pub tx_id: String,
    /// Output amount claimed by the swap API; not trusted for round trips
    pub reported_out_amount: Option<Amount>,
}

/// Signs and submits the swap described by a quote
#[async_trait::async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn submit(&self, quote: &Quote) -> ExecutionResult<SwapSubmission>;

    /// Address of the signing wallet
    fn owner(&self) -> String;
}

/// Owner's balance of one mint before and after a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChange {
    pub mint: String,
    pub pre: Amount,
    pub post: Amount,
}

impl BalanceChange {
    pub fn new(mint: &str, pre: Amount, post: Amount) -> Self {
        Self {
            mint: mint.to_string(),
            pre,
            post,
        }
    }

    /// Net increase, `None` when the balance did not grow
    pub fn gain(&self) -> Option<Amount> {
        match self.post.checked_sub(self.pre) {
            Some(g) if !g.is_zero() => Some(g),
            _ => None,
        }
    }

    /// Net decrease (zero when the balance grew)
    pub fn loss(&self) -> Amount {
        self.pre.saturating_sub(self.post)
    }
}

/// On-chain lookup result
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    Found {
        changes: Vec<BalanceChange>,
        on_chain_error: Option<String>,
    },
    NotYetFound,
}

impl LookupResult {
    pub fn change_for(&self, mint: &str) -> Option<&BalanceChange> {
        match self {
            LookupResult::Found { changes, .. } => changes.iter().find(|c| c.mint == mint),
            LookupResult::NotYetFound => None,
        }
    }
}

/// Transaction status lookup by signature
#[async_trait::async_trait]
pub trait TransactionLookup: Send + Sync {
    async fn get_transaction_result(&self, tx_id: &str, owner: &str) -> ExecutionResult<LookupResult>;
}

/// Wallet balance query in smallest units
#[async_trait::async_trait]
pub trait BalanceQuery: Send + Sync {
    async fn get_token_balance(&self, owner: &str, mint: &str) -> ExecutionResult<Amount>;
}
