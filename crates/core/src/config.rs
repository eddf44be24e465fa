//! Configuration types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{CoreError, WSOL_MINT};

/// External endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub rpc_url: String,
    pub backup_rpc_url: Option<String>,
    pub jupiter_api_url: String,
    pub token_list_url: String,
    pub token_list_tag: Option<String>,
    pub token_cache_path: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            backup_rpc_url: Some("https://api.mainnet-beta.solana.com".to_string()),
            jupiter_api_url: "https://lite-api.jup.ag/swap/v1".to_string(),
            token_list_url: "https://tokens.jup.ag/tokens".to_string(),
            token_list_tag: None,
            token_cache_path: "./temp/tokens.json".to_string(),
        }
    }
}

/// Traded token and rotation list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub token_a: String,
    pub rotation_tokens: Vec<String>,
    pub rotation_interval_minutes: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            token_a: WSOL_MINT.to_string(),
            rotation_tokens: vec![],
            rotation_interval_minutes: 0,
        }
    }
}

/// How the trade amount evolves between cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSizeStrategy {
    /// Trade the configured size every cycle
    Fixed,
    /// Trade the running balance, which grows with each verified gain
    Cumulative,
}

impl FromStr for TradeSizeStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(TradeSizeStrategy::Fixed),
            "cumulative" => Ok(TradeSizeStrategy::Cumulative),
            other => Err(CoreError::InvalidConfig(format!(
                "unknown trade size strategy: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for TradeSizeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSizeStrategy::Fixed => write!(f, "fixed"),
            TradeSizeStrategy::Cumulative => write!(f, "cumulative"),
        }
    }
}

/// Execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Trade size in human units of the traded token
    pub trade_size: Decimal,
    pub trade_size_strategy: TradeSizeStrategy,
    pub slippage_bps: u16,
    pub adaptive_slippage: bool,
    pub trading_enabled: bool,
    pub wrap_unwrap_sol: bool,
    pub priority_micro_lamports: u64,
    pub store_failed_tx_in_history: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            trade_size: Decimal::ONE,
            trade_size_strategy: TradeSizeStrategy::Fixed,
            slippage_bps: 100,
            adaptive_slippage: false,
            trading_enabled: true,
            wrap_unwrap_sol: true,
            priority_micro_lamports: 100,
            store_failed_tx_in_history: true,
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub min_profit_pct: f64,
    /// Half-width of the per-iteration threshold randomization, in percent
    pub threshold_jitter_pct: f64,
    pub min_interval_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_profit_pct: 0.5,
            threshold_jitter_pct: 1.0,
            min_interval_ms: 100,
        }
    }
}

impl DetectionConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Risk management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Halt once consecutive balance shortfalls exceed this
    pub balance_shortfall_ceiling: u32,
    /// Halt once consecutive errors exceed this
    pub error_ceiling: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            balance_shortfall_ceiling: 5,
            error_ceiling: 100,
        }
    }
}

/// Quote provider throttling policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests_per_window: u32,
    /// Request count at which the poll interval starts stretching
    pub caution_threshold: u32,
    pub cooldown_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests_per_window: 60,
            caution_threshold: 45,
            cooldown_ms: 30_000,
            max_backoff_ms: 10_000,
        }
    }
}

/// Transaction confirmation polling policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    pub max_attempts: u32,
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_factor: f64,
    pub randomize: bool,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            min_backoff_ms: 1_000,
            max_backoff_ms: 4_000,
            backoff_factor: 2.0,
            randomize: true,
        }
    }
}

/// Complete bot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    pub endpoints: EndpointConfig,
    pub tokens: TokenConfig,
    pub execution: ExecutionConfig,
    pub detection: DetectionConfig,
    pub risk: RiskConfig,
    pub rate_limit: RateLimitConfig,
    pub confirmation: ConfirmationConfig,
    pub trade_history_path: Option<String>,
}

impl BotConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.endpoints.rpc_url.trim().is_empty() {
            return Err(CoreError::InvalidConfig("RPC endpoint is not set".into()));
        }
        if self.tokens.token_a.trim().is_empty() {
            return Err(CoreError::InvalidConfig("traded token is not set".into()));
        }
        if self.execution.trade_size <= Decimal::ZERO {
            return Err(CoreError::InvalidConfig(format!(
                "trade size must be positive, got {}",
                self.execution.trade_size
            )));
        }
        if self.execution.slippage_bps > crate::MAX_SLIPPAGE_BPS {
            return Err(CoreError::InvalidConfig(format!(
                "slippage {} bps exceeds 100%",
                self.execution.slippage_bps
            )));
        }
        if !self.detection.min_profit_pct.is_finite() {
            return Err(CoreError::InvalidConfig("minimum profit must be finite".into()));
        }
        if self.detection.min_interval_ms == 0 {
            return Err(CoreError::InvalidConfig("poll interval must be positive".into()));
        }
        if self.rate_limit.caution_threshold >= self.rate_limit.max_requests_per_window {
            return Err(CoreError::InvalidConfig(
                "rate limit caution threshold must be below the window ceiling".into(),
            ));
        }
        if self.confirmation.max_attempts == 0 {
            return Err(CoreError::InvalidConfig("confirmation attempts must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> BotConfig {
        let mut config = BotConfig::default();
        config.endpoints.rpc_url = "http://localhost:8899".to_string();
        config
    }

    #[test]
    fn test_observed_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.risk.balance_shortfall_ceiling, 5);
        assert_eq!(config.risk.error_ceiling, 100);
        assert_eq!(config.rate_limit.caution_threshold, 45);
        assert_eq!(config.rate_limit.cooldown_ms, 30_000);
        assert_eq!(config.rate_limit.max_backoff_ms, 10_000);
        assert_eq!(config.confirmation.max_attempts, 30);
        assert_eq!(config.tokens.token_a, WSOL_MINT);
    }

    #[test]
    fn test_validate() {
        assert!(valid().validate().is_ok());
        assert!(BotConfig::default().validate().is_err());

        let mut config = valid();
        config.execution.trade_size = Decimal::ZERO;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.execution.slippage_bps = 10_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trade_size_strategy_parse() {
        assert_eq!("fixed".parse::<TradeSizeStrategy>().unwrap(), TradeSizeStrategy::Fixed);
        assert_eq!(" Cumulative ".parse::<TradeSizeStrategy>().unwrap(), TradeSizeStrategy::Cumulative);
        assert!("pingpong".parse::<TradeSizeStrategy>().is_err());
    }
}
