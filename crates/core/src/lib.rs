//! Core types and utilities for the Jupiter round-trip arbitrage bot
//!
//! This crate provides shared types used across all components:
//! - Smallest-unit amounts with explicit decimal conversion
//! - Token definitions
//! - Quote and route types
//! - Trade history records
//! - Bot configuration and error taxonomy

pub mod types;
pub mod tokens;
pub mod quotes;
pub mod trades;
pub mod config;
pub mod errors;

pub use types::*;
pub use tokens::*;
pub use quotes::*;
pub use trades::*;
pub use config::*;
pub use errors::*;
