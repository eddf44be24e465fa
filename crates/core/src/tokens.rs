//! Token definitions and utilities
//!
//! CRITICAL: Always use correct decimals!
//! - SOL / wrapped SOL: 9 decimals
//! - USDC/USDT: 6 decimals
//! - JUP: 6 decimals

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use rust_decimal::Decimal;

use crate::{Amount, CoreError, CoreResult};

pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Token information, loaded once from the token list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub decimals: u8,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Token {
    pub fn new(address: &str, symbol: &str, name: &str, decimals: u8) -> Self {
        Self {
            address: address.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
            tags: vec![],
        }
    }

    pub fn is_wrapped_sol(&self) -> bool {
        self.address == WSOL_MINT
    }

    /// Smallest-unit amount for a human-readable value of this token
    pub fn to_amount(&self, value: Decimal) -> CoreResult<Amount> {
        Amount::from_decimal(value, self.decimals)
    }

    /// Human-readable value of a smallest-unit amount of this token
    pub fn to_decimal(&self, amount: Amount) -> CoreResult<Decimal> {
        amount.to_decimal(self.decimals)
    }

    /// Short display form, e.g. `USDC (EPjFWdd5...)`
    pub fn label(&self) -> String {
        let prefix: String = self.address.chars().take(8).collect();
        format!("{} ({}...)", self.symbol, prefix)
    }
}

/// Well-known Solana tokens, used when the token list is unavailable
pub static TOKENS: LazyLock<HashMap<&'static str, Token>> = LazyLock::new(|| {
    let mut tokens = HashMap::new();
    tokens.insert(WSOL_MINT, Token::new(WSOL_MINT, "SOL", "Wrapped SOL", 9));
    tokens.insert(USDC_MINT, Token::new(USDC_MINT, "USDC", "USD Coin", 6));
    tokens.insert(
        "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
        Token::new("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", "USDT", "USDT", 6),
    );
    tokens.insert(
        "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZXnKzLf",
        Token::new("JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZXnKzLf", "JUP", "Jupiter", 6),
    );
    tokens
});

/// Get a well-known token by mint address
pub fn get_token(address: &str) -> Option<&'static Token> {
    TOKENS.get(address)
}

/// Find a token by mint in a loaded list, falling back to the well-known table
pub fn resolve_token(list: &[Token], address: &str) -> CoreResult<Token> {
    list.iter()
        .find(|t| t.address == address)
        .or_else(|| get_token(address))
        .cloned()
        .ok_or_else(|| CoreError::TokenNotFound(address.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usdc_has_6_decimals() {
        let usdc = get_token(USDC_MINT).unwrap();
        assert_eq!(usdc.decimals, 6, "USDC must have 6 decimals!");
    }

    #[test]
    fn test_sol_has_9_decimals() {
        let sol = get_token(WSOL_MINT).unwrap();
        assert_eq!(sol.decimals, 9, "SOL must have 9 decimals!");
        assert!(sol.is_wrapped_sol());
    }

    #[test]
    fn test_resolve_prefers_loaded_list() {
        let mut custom = Token::new(USDC_MINT, "USDC.list", "From list", 6);
        custom.tags.push("verified".to_string());
        let resolved = resolve_token(&[custom.clone()], USDC_MINT).unwrap();
        assert_eq!(resolved, custom);

        let fallback = resolve_token(&[], WSOL_MINT).unwrap();
        assert_eq!(fallback.symbol, "SOL");
        let missing = resolve_token(&[], "unknown").unwrap_err();
        assert!(matches!(missing, CoreError::TokenNotFound(ref mint) if mint == "unknown"));
        assert_eq!(missing.to_string(), "Token not found: unknown");
    }

    #[test]
    fn test_trade_size_conversion() {
        let usdc = get_token(USDC_MINT).unwrap();
        let amount = usdc.to_amount(Decimal::new(1, 0)).unwrap();
        assert_eq!(amount, Amount::from_u64(1_000_000));
        assert_eq!(usdc.label(), "USDC (EPjFWdd5...)");
    }
}
