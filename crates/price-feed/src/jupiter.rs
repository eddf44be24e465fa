//! Jupiter REST quote provider

use reqwest::{Client, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use jup_arb_core::{Amount, FeedError, FeedResult, Quote, QuoteRequest, RouteHop};

/// Source of swap quotes
#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn get_quote(&self, request: &QuoteRequest) -> FeedResult<Quote>;
    fn name(&self) -> &str;
}

/// Swap transaction options
#[derive(Debug, Clone)]
pub struct SwapOptions {
    pub wrap_and_unwrap_sol: bool,
    pub compute_unit_price_micro_lamports: u64,
}

impl Default for SwapOptions {
    fn default() -> Self {
        Self {
            wrap_and_unwrap_sol: true,
            compute_unit_price_micro_lamports: 100,
        }
    }
}

/// Unsigned transaction returned by the swap endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapTransaction {
    /// base64 serialized versioned transaction
    pub swap_transaction: String,
    #[serde(default)]
    pub last_valid_block_height: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    input_mint: String,
    in_amount: Amount,
    output_mint: String,
    out_amount: Amount,
    other_amount_threshold: Amount,
    slippage_bps: u16,
    #[serde(default)]
    price_impact_pct: Option<String>,
    #[serde(default)]
    route_plan: Vec<RoutePlanStep>,
    #[serde(default)]
    context_slot: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutePlanStep {
    swap_info: SwapInfo,
    #[serde(default)]
    percent: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapInfo {
    #[serde(default)]
    amm_key: Option<String>,
    #[serde(default)]
    label: Option<String>,
    input_mint: String,
    output_mint: String,
    in_amount: Amount,
    out_amount: Amount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequestBody<'a> {
    quote_response: serde_json::Value,
    user_public_key: &'a str,
    wrap_and_unwrap_sol: bool,
    compute_unit_price_micro_lamports: u64,
    dynamic_compute_unit_limit: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

/// Jupiter swap API client
#[derive(Clone)]
pub struct JupiterClient {
    client: Client,
    base_url: String,
}

impl JupiterClient {
    pub fn new(base_url: &str) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FeedError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request an unsigned swap transaction for `quote`
    pub async fn swap_transaction(
        &self,
        quote: &Quote,
        user_public_key: &str,
        options: &SwapOptions,
    ) -> FeedResult<SwapTransaction> {
        let body = SwapRequestBody {
            quote_response: swap_payload(quote)?,
            user_public_key,
            wrap_and_unwrap_sol: options.wrap_and_unwrap_sol,
            compute_unit_price_micro_lamports: options.compute_unit_price_micro_lamports,
            dynamic_compute_unit_limit: true,
        };

        let resp = self
            .client
            .post(format!("{}/swap", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| FeedError::Http(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| FeedError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(classify_error(status, &text, quote));
        }

        serde_json::from_str(&text).map_err(|e| FeedError::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl QuoteProvider for JupiterClient {
    async fn get_quote(&self, request: &QuoteRequest) -> FeedResult<Quote> {
        let query = [
            ("inputMint", request.input_mint.clone()),
            ("outputMint", request.output_mint.clone()),
            ("amount", request.amount.to_string()),
            ("slippageBps", request.slippage_bps.to_string()),
        ];

        let resp = self
            .client
            .get(format!("{}/quote", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| FeedError::Http(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| FeedError::Http(e.to_string()))?;
        if !status.is_success() {
            let err = classify_quote_error(status, &text, request);
            debug!(status = status.as_u16(), error = %err, "Quote request failed");
            return Err(err);
        }

        parse_quote(&text)
    }

    fn name(&self) -> &str {
        "jupiter"
    }
}

/// Parse a quote response, keeping the raw payload for the swap request
pub fn parse_quote(text: &str) -> FeedResult<Quote> {
    let payload: serde_json::Value =
        serde_json::from_str(text).map_err(|e| FeedError::InvalidResponse(e.to_string()))?;
    let resp: QuoteResponse = serde_json::from_value(payload.clone())
        .map_err(|e| FeedError::InvalidResponse(e.to_string()))?;

    if resp.route_plan.is_empty() || resp.out_amount.is_zero() {
        return Err(FeedError::NoRouteFound {
            input: resp.input_mint,
            output: resp.output_mint,
        });
    }

    let price_impact_pct = resp
        .price_impact_pct
        .as_deref()
        .and_then(|s| Decimal::from_str(s).ok())
        .and_then(|d| d.to_f64())
        .unwrap_or(0.0);

    let route_hops = resp
        .route_plan
        .into_iter()
        .map(|step| RouteHop {
            label: step.swap_info.label.unwrap_or_else(|| "unknown".to_string()),
            amm_key: step.swap_info.amm_key,
            input_mint: step.swap_info.input_mint,
            output_mint: step.swap_info.output_mint,
            in_amount: step.swap_info.in_amount,
            out_amount: step.swap_info.out_amount,
            percent: step.percent,
        })
        .collect();

    Ok(Quote {
        input_mint: resp.input_mint,
        output_mint: resp.output_mint,
        in_amount: resp.in_amount,
        out_amount: resp.out_amount,
        other_amount_threshold: resp.other_amount_threshold,
        slippage_bps: Decimal::from(resp.slippage_bps),
        price_impact_pct,
        route_hops,
        context_slot: resp.context_slot,
        payload,
    })
}

/// Provider payload with the current slippage bound and minimum output
pub fn swap_payload(quote: &Quote) -> FeedResult<serde_json::Value> {
    let mut payload = quote.payload.clone();
    let obj = payload
        .as_object_mut()
        .ok_or_else(|| FeedError::InvalidResponse("quote has no provider payload".into()))?;

    obj.insert(
        "slippageBps".to_string(),
        serde_json::Value::from(quote.wire_slippage_bps()),
    );
    obj.insert(
        "otherAmountThreshold".to_string(),
        serde_json::Value::String(quote.other_amount_threshold.to_string()),
    );
    Ok(payload)
}

fn classify_quote_error(status: StatusCode, body: &str, request: &QuoteRequest) -> FeedError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("Quote provider rate limit hit");
        return FeedError::RateLimited;
    }

    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let no_route = parsed
        .error_code
        .as_deref()
        .map(|c| c.contains("ROUTE"))
        .unwrap_or(false)
        || parsed
            .error
            .as_deref()
            .map(|e| e.to_ascii_lowercase().contains("route"))
            .unwrap_or(false);

    if no_route {
        return FeedError::NoRouteFound {
            input: request.input_mint.clone(),
            output: request.output_mint.clone(),
        };
    }

    FeedError::Status {
        status: status.as_u16(),
        body: body.to_string(),
    }
}

fn classify_error(status: StatusCode, body: &str, quote: &Quote) -> FeedError {
    let request = QuoteRequest::new(&quote.input_mint, &quote.output_mint, quote.in_amount);
    classify_quote_error(status, body, &request)
}
