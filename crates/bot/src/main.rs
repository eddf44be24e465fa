//! Jupiter round-trip arbitrage bot
//!
//! Main entry point

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use jup_arb_bot::{spawn_stdin_reader, RunState, Runner, Settings, StopReason};
use jup_arb_core::{resolve_token, Token};
use jup_arb_executor::{
    check_rpc, load_keypair, rpc_client, RetryPolicy, SolanaBalances, SolanaLookup,
    SolanaSwapExecutor, TradeExecutor,
};
use jup_arb_price_feed::{JupiterClient, JupiterTokenList, SwapOptions, TokenListSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting Jupiter arbitrage bot v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let Settings {
        config,
        wallet_secret,
    } = Settings::load()?;

    let keypair = load_keypair(&wallet_secret).context("invalid SOLANA_WALLET_PRIVATE_KEY")?;
    drop(wallet_secret);

    let rpc = rpc_client(&config.endpoints.rpc_url);
    let version = check_rpc(&rpc)
        .await
        .with_context(|| format!("cannot reach RPC {}", config.endpoints.rpc_url))?;
    info!(%version, "RPC reachable");
    let backup = config.endpoints.backup_rpc_url.as_deref().map(rpc_client);

    // Tokens
    let token_list = JupiterTokenList::new(&config.endpoints.token_list_url)?
        .with_cache(&config.endpoints.token_cache_path);
    let tokens = match token_list
        .list_tokens(config.endpoints.token_list_tag.as_deref())
        .await
    {
        Ok(tokens) => {
            info!(count = tokens.len(), "Token list loaded");
            tokens
        }
        Err(e) => {
            warn!("Token list unavailable, using built-in tokens: {}", e);
            Vec::new()
        }
    };

    let token = resolve_token(&tokens, &config.tokens.token_a).context("TOKEN_A is not tradable")?;
    let rotation: Vec<Token> = config
        .tokens
        .rotation_tokens
        .iter()
        .filter_map(|mint| match resolve_token(&tokens, mint) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Rotation token skipped: {}", e);
                None
            }
        })
        .collect();

    // Execution
    let jupiter = JupiterClient::new(&config.endpoints.jupiter_api_url)?;
    let swap_options = SwapOptions {
        wrap_and_unwrap_sol: config.execution.wrap_unwrap_sol,
        compute_unit_price_micro_lamports: config.execution.priority_micro_lamports,
    };
    let executor = TradeExecutor::new(
        Arc::new(SolanaSwapExecutor::new(rpc.clone(), jupiter.clone(), keypair, swap_options)),
        Arc::new(SolanaLookup::new(rpc.clone(), backup)),
        Arc::new(SolanaBalances::new(rpc)),
        RetryPolicy::from(&config.confirmation),
    );

    let state = RunState::new(&config, token.clone(), rotation, tokio::time::Instant::now().into_std())?;

    // Startup balance check
    let balance = executor
        .balance(&token.address)
        .await
        .context("failed to read wallet balance")?;
    if balance < state.trade_amount() {
        bail!(
            "wallet balance {} {} is below the trade size {}",
            token.to_decimal(balance)?,
            token.symbol,
            config.execution.trade_size
        );
    }
    info!(
        owner = %executor.owner(),
        token = %token.label(),
        balance = %token.to_decimal(balance)?,
        trade_size = %config.execution.trade_size,
        strategy = %config.execution.trade_size_strategy,
        "Wallet ready"
    );

    let mut runner = Runner::new(config, Arc::new(jupiter), executor, state);

    // Setup shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    spawn_signal_handler(shutdown_tx.clone());

    let (command_tx, command_rx) = mpsc::channel(16);
    if let Err(e) = spawn_stdin_reader(command_tx, shutdown_tx) {
        warn!("Manual control unavailable: {}", e);
    }
    info!("Keys: e=force execute, r=revert, t=toggle trading, n=rotate token, q=quit");

    match runner.run(command_rx, shutdown_rx).await {
        StopReason::Shutdown => {
            info!("Shutdown complete");
            Ok(())
        }
        StopReason::CircuitBreaker(trip) => {
            error!("Trading halted: {}", trip);
            Err(anyhow!("circuit breaker tripped: {}", trip))
        }
    }
}

/// Ctrl+C or SIGTERM flips the shutdown channel
fn spawn_signal_handler(shutdown: Arc<watch::Sender<bool>>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C");
            }
            _ = terminate => {
                info!("Received termination signal");
            }
        }

        shutdown.send_replace(true);
    });
}
