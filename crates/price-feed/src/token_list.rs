//! Token list source with disk cache

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use jup_arb_core::{FeedError, FeedResult, Token};

/// Source of token reference data, used once at startup
#[async_trait::async_trait]
pub trait TokenListSource: Send + Sync {
    async fn list_tokens(&self, filter_tag: Option<&str>) -> FeedResult<Vec<Token>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenCache {
    fetched_at: DateTime<Utc>,
    tag: Option<String>,
    tokens: Vec<Token>,
}

/// Jupiter token list, mirrored to a local file
pub struct JupiterTokenList {
    client: Client,
    url: String,
    cache_path: Option<PathBuf>,
}

impl JupiterTokenList {
    pub fn new(url: &str) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| FeedError::Http(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            cache_path: None,
        })
    }

    pub fn with_cache(mut self, path: impl AsRef<Path>) -> Self {
        self.cache_path = Some(path.as_ref().to_path_buf());
        self
    }

    async fn fetch(&self, filter_tag: Option<&str>) -> FeedResult<Vec<Token>> {
        let mut req = self.client.get(&self.url);
        if let Some(tag) = filter_tag {
            req = req.query(&[("tags", tag)]);
        }

        let resp = req.send().await.map_err(|e| FeedError::Http(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<Vec<Token>>()
            .await
            .map_err(|e| FeedError::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl TokenListSource for JupiterTokenList {
    async fn list_tokens(&self, filter_tag: Option<&str>) -> FeedResult<Vec<Token>> {
        match self.fetch(filter_tag).await {
            Ok(tokens) if !tokens.is_empty() => {
                info!("Fetched {} tokens from {}", tokens.len(), self.url);
                if let Some(path) = &self.cache_path {
                    if let Err(e) = store_cache(path, filter_tag, &tokens).await {
                        warn!(path = %path.display(), "Failed to write token cache: {}", e);
                    }
                }
                Ok(tokens)
            }
            result => {
                match &result {
                    Err(e) => warn!("Token list fetch failed: {}", e),
                    Ok(_) => warn!("Token list endpoint returned no tokens"),
                }
                let Some(path) = &self.cache_path else {
                    return Err(FeedError::TokenListUnavailable(
                        "fetch failed and no cache configured".into(),
                    ));
                };
                let tokens = load_cache(path).await?;
                info!(path = %path.display(), "Loaded {} tokens from cache", tokens.len());
                Ok(tokens)
            }
        }
    }
}

async fn store_cache(path: &Path, tag: Option<&str>, tokens: &[Token]) -> FeedResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FeedError::TokenListUnavailable(e.to_string()))?;
        }
    }

    let cache = TokenCache {
        fetched_at: Utc::now(),
        tag: tag.map(str::to_string),
        tokens: tokens.to_vec(),
    };
    let json = serde_json::to_vec(&cache).map_err(|e| FeedError::InvalidResponse(e.to_string()))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| FeedError::TokenListUnavailable(e.to_string()))
}

async fn load_cache(path: &Path) -> FeedResult<Vec<Token>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| FeedError::TokenListUnavailable(format!("{}: {}", path.display(), e)))?;

    // older caches hold a bare token array
    if let Ok(cache) = serde_json::from_slice::<TokenCache>(&bytes) {
        return Ok(cache.tokens);
    }
    serde_json::from_slice::<Vec<Token>>(&bytes)
        .map_err(|e| FeedError::TokenListUnavailable(format!("corrupt cache: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jup_arb_core::{USDC_MINT, WSOL_MINT};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("jup-arb-tokens-{}-{}", std::process::id(), name))
            .join("tokens.json")
    }

    fn tokens() -> Vec<Token> {
        vec![
            Token::new(WSOL_MINT, "SOL", "Wrapped SOL", 9),
            Token::new(USDC_MINT, "USDC", "USD Coin", 6),
        ]
    }

    #[tokio::test]
    async fn test_cache_roundtrip() {
        let path = temp_path("roundtrip");
        store_cache(&path, Some("verified"), &tokens()).await.unwrap();
        assert_eq!(load_cache(&path).await.unwrap(), tokens());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_bare_array_cache() {
        let path = temp_path("bare");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let json = serde_json::json!([
            { "address": USDC_MINT, "symbol": "USDC", "decimals": 6, "logoURI": "x" }
        ]);
        std::fs::write(&path, json.to_string()).unwrap();

        let loaded = load_cache(&path).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].decimals, 6);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_falls_back_to_cache_when_unreachable() {
        let path = temp_path("fallback");
        store_cache(&path, None, &tokens()).await.unwrap();

        let source = JupiterTokenList::new("http://127.0.0.1:9/tokens")
            .unwrap()
            .with_cache(&path);
        let listed = source.list_tokens(None).await.unwrap();
        assert_eq!(listed, tokens());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_without_cache() {
        let source = JupiterTokenList::new("http://127.0.0.1:9/tokens").unwrap();
        let err = source.list_tokens(Some("verified")).await.unwrap_err();
        assert!(matches!(err, FeedError::TokenListUnavailable(_)));
    }
}
