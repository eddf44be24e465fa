//! Trade failure type and user-facing error labels

use thiserror::Error;

use jup_arb_core::{ExecutionError, TradeEntry};

/// Failed trade: the classified error plus the history entry recorded for it
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct TradeError {
    pub entry: TradeEntry,
    pub error: ExecutionError,
}

/// Known swap program errors, by custom program error code
const PROGRAM_ERRORS: &[(u32, &str)] = &[(6001, "Slippage Tolerance Exceeded")];

/// Short label for a swap rejection message
pub fn submission_label(detail: &str) -> String {
    for (code, label) in PROGRAM_ERRORS {
        let hex = format!("0x{:x}", code);
        if detail.contains(&code.to_string()) || detail.to_ascii_lowercase().contains(&hex) {
            return label.to_string();
        }
    }

    let lower = detail.to_ascii_lowercase();
    if lower.contains("blockhash not found") || lower.contains("block height exceeded") {
        return "Transaction Expired".to_string();
    }
    if lower.contains("insufficient") {
        return "Insufficient Funds".to_string();
    }
    "Unknown Error".to_string()
}
