//! Solana RPC implementations of the execution collaborators

use base64::Engine as _;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcTransactionConfig};
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, UiTransactionTokenBalance, UiTransactionEncoding,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use jup_arb_core::{Amount, ExecutionError, ExecutionResult, Quote, WSOL_MINT};
use jup_arb_price_feed::{JupiterClient, SwapOptions};

use crate::errors::submission_label;
use crate::traits::{
    BalanceChange, BalanceQuery, LookupResult, SwapExecutor, SwapSubmission, TransactionLookup,
};

fn rpc_err(e: impl std::fmt::Display) -> ExecutionError {
    ExecutionError::Rpc(e.to_string())
}

fn parse_pubkey(s: &str) -> ExecutionResult<Pubkey> {
    Pubkey::from_str(s).map_err(|e| ExecutionError::Rpc(format!("invalid address {}: {}", s, e)))
}

pub fn rpc_client(url: &str) -> Arc<RpcClient> {
    Arc::new(RpcClient::new_with_commitment(
        url.to_string(),
        CommitmentConfig::confirmed(),
    ))
}

/// Decode a base58 wallet secret
pub fn load_keypair(secret: &str) -> ExecutionResult<Keypair> {
    let bytes = bs58::decode(secret.trim())
        .into_vec()
        .map_err(|e| ExecutionError::Signing(format!("wallet secret is not base58: {}", e)))?;
    Keypair::from_bytes(&bytes)
        .map_err(|e| ExecutionError::Signing(format!("invalid wallet keypair: {}", e)))
}

/// Node version, used to check the RPC is reachable
pub async fn check_rpc(rpc: &RpcClient) -> ExecutionResult<String> {
    let version = rpc.get_version().await.map_err(rpc_err)?;
    Ok(version.solana_core)
}

/// Signs Jupiter swap transactions with the wallet keypair
pub struct SolanaSwapExecutor {
    rpc: Arc<RpcClient>,
    jupiter: JupiterClient,
    keypair: Keypair,
    options: SwapOptions,
}

impl SolanaSwapExecutor {
    pub fn new(rpc: Arc<RpcClient>, jupiter: JupiterClient, keypair: Keypair, options: SwapOptions) -> Self {
        Self {
            rpc,
            jupiter,
            keypair,
            options,
        }
    }

    fn sign(&self, encoded: &str) -> ExecutionResult<VersionedTransaction> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ExecutionError::Signing(format!("swap transaction is not base64: {}", e)))?;
        let unsigned: VersionedTransaction = bincode::deserialize(&bytes)
            .map_err(|e| ExecutionError::Signing(format!("malformed swap transaction: {}", e)))?;

        VersionedTransaction::try_new(unsigned.message, &[&self.keypair])
            .map_err(|e| ExecutionError::Signing(e.to_string()))
    }
}

fn rejected(detail: String) -> ExecutionError {
    ExecutionError::SubmissionRejected {
        label: submission_label(&detail),
        detail,
    }
}

#[async_trait::async_trait]
impl SwapExecutor for SolanaSwapExecutor {
    async fn submit(&self, quote: &Quote) -> ExecutionResult<SwapSubmission> {
        let swap = self
            .jupiter
            .swap_transaction(quote, &self.owner(), &self.options)
            .await
            .map_err(|e| rejected(e.to_string()))?;

        let signed = self.sign(&swap.swap_transaction)?;

        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(CommitmentLevel::Confirmed),
            max_retries: Some(2),
            ..Default::default()
        };
        let signature = self
            .rpc
            .send_transaction_with_config(&signed, config)
            .await
            .map_err(|e| rejected(e.to_string()))?;

        debug!(%signature, last_valid_block_height = swap.last_valid_block_height, "Swap sent");
        Ok(SwapSubmission {
            tx_id: signature.to_string(),
            reported_out_amount: Some(quote.out_amount),
        })
    }

    fn owner(&self) -> String {
        self.keypair.pubkey().to_string()
    }
}

/// Transaction lookup on the primary RPC, then the backup
pub struct SolanaLookup {
    primary: Arc<RpcClient>,
    backup: Option<Arc<RpcClient>>,
}

impl SolanaLookup {
    pub fn new(primary: Arc<RpcClient>, backup: Option<Arc<RpcClient>>) -> Self {
        Self { primary, backup }
    }

    async fn fetch(
        rpc: &RpcClient,
        signature: &Signature,
    ) -> Option<EncodedConfirmedTransactionWithStatusMeta> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        match rpc.get_transaction_with_config(signature, config).await {
            Ok(tx) => Some(tx),
            Err(e) => {
                debug!(url = %rpc.url(), "Transaction fetch failed: {}", e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl TransactionLookup for SolanaLookup {
    async fn get_transaction_result(&self, tx_id: &str, owner: &str) -> ExecutionResult<LookupResult> {
        let signature = Signature::from_str(tx_id).map_err(rpc_err)?;

        let mut fetched = Self::fetch(&self.primary, &signature).await;
        if fetched.is_none() {
            if let Some(backup) = &self.backup {
                fetched = Self::fetch(backup, &signature).await;
            }
        }

        let Some(meta) = fetched.and_then(|tx| tx.transaction.meta) else {
            return Ok(LookupResult::NotYetFound);
        };

        if let Some(err) = &meta.err {
            return Ok(LookupResult::Found {
                changes: vec![],
                on_chain_error: Some(err.to_string()),
            });
        }

        let pre = owned_balances(&meta.pre_token_balances, owner);
        let post = owned_balances(&meta.post_token_balances, owner);
        let mut changes = token_changes(&pre, &post);

        // fee payer is the signing wallet
        if let (Some(&pre_lamports), Some(&post_lamports)) =
            (meta.pre_balances.first(), meta.post_balances.first())
        {
            add_native_change(&mut changes, pre_lamports, post_lamports);
        }

        Ok(LookupResult::Found {
            changes,
            on_chain_error: None,
        })
    }
}

fn owned_balances(
    balances: &OptionSerializer<Vec<UiTransactionTokenBalance>>,
    owner: &str,
) -> Vec<(String, Amount)> {
    let balances: Option<Vec<UiTransactionTokenBalance>> = balances.clone().into();
    balances
        .unwrap_or_default()
        .into_iter()
        .filter(|b| Option::<String>::from(b.owner.clone()).as_deref() == Some(owner))
        .filter_map(|b| match Amount::from_str(&b.ui_token_amount.amount) {
            Ok(amount) => Some((b.mint, amount)),
            Err(e) => {
                warn!(mint = %b.mint, "Unparseable token balance: {}", e);
                None
            }
        })
        .collect()
}

/// Per-mint change of the owner's token balances. Accounts missing on one
/// side (created or closed in the transaction) count as zero.
fn token_changes(pre: &[(String, Amount)], post: &[(String, Amount)]) -> Vec<BalanceChange> {
    let mut by_mint: BTreeMap<&str, (Amount, Amount)> = BTreeMap::new();
    for (mint, amount) in pre {
        let entry = by_mint.entry(mint.as_str()).or_default();
        entry.0 = entry.0.saturating_add(*amount);
    }
    for (mint, amount) in post {
        let entry = by_mint.entry(mint.as_str()).or_default();
        entry.1 = entry.1.saturating_add(*amount);
    }

    by_mint
        .into_iter()
        .map(|(mint, (pre, post))| BalanceChange::new(mint, pre, post))
        .collect()
}

/// Wrapped SOL round trips that unwrap to native SOL leave no token
/// balance; the lamport change stands in for it.
fn add_native_change(changes: &mut Vec<BalanceChange>, pre_lamports: u64, post_lamports: u64) {
    if changes.iter().any(|c| c.mint == WSOL_MINT && c.pre != c.post) {
        return;
    }
    changes.retain(|c| c.mint != WSOL_MINT);
    changes.push(BalanceChange::new(
        WSOL_MINT,
        Amount::from_u64(pre_lamports),
        Amount::from_u64(post_lamports),
    ));
}

/// Wallet balances over RPC; wrapped SOL reads the native lamport balance
pub struct SolanaBalances {
    rpc: Arc<RpcClient>,
}

impl SolanaBalances {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait::async_trait]
impl BalanceQuery for SolanaBalances {
    async fn get_token_balance(&self, owner: &str, mint: &str) -> ExecutionResult<Amount> {
        let owner = parse_pubkey(owner)?;
        if mint == WSOL_MINT {
            let lamports = self.rpc.get_balance(&owner).await.map_err(rpc_err)?;
            return Ok(Amount::from_u64(lamports));
        }

        let accounts = self
            .rpc
            .get_token_accounts_by_owner(&owner, TokenAccountsFilter::Mint(parse_pubkey(mint)?))
            .await
            .map_err(rpc_err)?;

        let mut total = Amount::ZERO;
        for account in accounts {
            let balance = self
                .rpc
                .get_token_account_balance(&parse_pubkey(&account.pubkey)?)
                .await
                .map_err(rpc_err)?;
            let amount = Amount::from_str(&balance.amount).map_err(rpc_err)?;
            total = total.saturating_add(amount);
        }
        Ok(total)
    }
}
