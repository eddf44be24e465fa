//! Environment configuration
//!
//! Read once at startup. Variable names follow the bot's `.env` file
//! (`DEFAULT_RPC`, `TRADE_SIZE`, `MIN_PROFIT_THRESHOLD`, ...); anything unset
//! keeps the [`BotConfig`] default.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

use jup_arb_core::BotConfig;

/// Raw environment values, keys lowercased by the `config` crate
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnvSettings {
    solana_wallet_private_key: Option<String>,
    default_rpc: Option<String>,
    backup_rpc: Option<String>,
    jupiter_api_url: Option<String>,
    token_list_url: Option<String>,
    token_list_tag: Option<String>,
    token_cache_path: Option<String>,
    token_a: Option<String>,
    rotation_tokens: Option<Vec<String>>,
    token_rotation_interval_minutes: Option<u64>,
    trade_size: Option<String>,
    trade_size_strategy: Option<String>,
    min_profit_threshold: Option<f64>,
    slippage_bps: Option<u16>,
    adaptive_slippage: Option<bool>,
    min_interval_ms: Option<u64>,
    trading_enabled: Option<bool>,
    wrap_unwrap_sol: Option<bool>,
    priority: Option<u64>,
    store_failed_tx_in_history: Option<bool>,
    trade_history_path: Option<String>,
}

/// Validated startup settings
pub struct Settings {
    pub config: BotConfig,
    /// base58 keypair secret
    pub wallet_secret: String,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("config", &self.config)
            .field("wallet_secret", &"<redacted>")
            .finish()
    }
}

impl Settings {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        Self::from_source(None)
    }

    /// Load from an explicit variable map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_source(Some(vars))
    }

    fn from_source(vars: Option<HashMap<String, String>>) -> Result<Self> {
        let environment = config::Environment::default()
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("rotation_tokens")
            .source(vars);

        let raw: EnvSettings = config::Config::builder()
            .add_source(environment)
            .build()
            .context("failed to read environment")?
            .try_deserialize()
            .context("invalid environment configuration")?;

        raw.into_settings()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl EnvSettings {
    fn into_settings(self) -> Result<Settings> {
        let Some(wallet_secret) = non_empty(self.solana_wallet_private_key) else {
            bail!("SOLANA_WALLET_PRIVATE_KEY is not set");
        };
        let Some(rpc_url) = non_empty(self.default_rpc) else {
            bail!("DEFAULT_RPC is not set");
        };

        let mut config = BotConfig::default();

        let endpoints = &mut config.endpoints;
        endpoints.rpc_url = rpc_url;
        if let Some(backup) = self.backup_rpc {
            endpoints.backup_rpc_url = non_empty(Some(backup));
        }
        if let Some(url) = non_empty(self.jupiter_api_url) {
            endpoints.jupiter_api_url = url;
        }
        if let Some(url) = non_empty(self.token_list_url) {
            endpoints.token_list_url = url;
        }
        endpoints.token_list_tag = non_empty(self.token_list_tag);
        if let Some(path) = non_empty(self.token_cache_path) {
            endpoints.token_cache_path = path;
        }

        let tokens = &mut config.tokens;
        if let Some(mint) = non_empty(self.token_a) {
            tokens.token_a = mint;
        }
        tokens.rotation_tokens = self
            .rotation_tokens
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| non_empty(Some(m)))
            .collect();
        if let Some(minutes) = self.token_rotation_interval_minutes {
            tokens.rotation_interval_minutes = minutes;
        }

        let execution = &mut config.execution;
        if let Some(size) = non_empty(self.trade_size) {
            execution.trade_size = size
                .parse::<Decimal>()
                .with_context(|| format!("invalid TRADE_SIZE: {}", size))?;
        }
        if let Some(strategy) = non_empty(self.trade_size_strategy) {
            execution.trade_size_strategy = strategy.parse()?;
        }
        if let Some(bps) = self.slippage_bps {
            execution.slippage_bps = bps;
        }
        if let Some(adaptive) = self.adaptive_slippage {
            execution.adaptive_slippage = adaptive;
        }
        if let Some(enabled) = self.trading_enabled {
            execution.trading_enabled = enabled;
        }
        if let Some(wrap) = self.wrap_unwrap_sol {
            execution.wrap_unwrap_sol = wrap;
        }
        if let Some(priority) = self.priority {
            execution.priority_micro_lamports = priority;
        }
        if let Some(store) = self.store_failed_tx_in_history {
            execution.store_failed_tx_in_history = store;
        }

        if let Some(pct) = self.min_profit_threshold {
            config.detection.min_profit_pct = pct;
        }
        if let Some(ms) = self.min_interval_ms {
            config.detection.min_interval_ms = ms;
        }

        config.trade_history_path = non_empty(self.trade_history_path);

        config.validate()?;

        Ok(Settings {
            config,
            wallet_secret,
        })
    }
}
