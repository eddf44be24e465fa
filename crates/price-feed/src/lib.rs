//! Quote provider, token list and provider throttling
//!
//! Features:
//! - Quote Provider trait with a Jupiter REST implementation
//! - Swap transaction requests carrying the current slippage bound
//! - Token list fetch with a local disk cache fallback
//! - Rolling-window rate limiter with 429 cooldown

pub mod jupiter;
pub mod token_list;
pub mod rate_limit;

pub use jupiter::{JupiterClient, QuoteProvider, SwapOptions, SwapTransaction};
pub use token_list::{JupiterTokenList, TokenListSource};
pub use rate_limit::{Admission, RateLimiter};
