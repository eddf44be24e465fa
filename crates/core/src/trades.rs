//! Trade history records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::{Amount, CoreError, CoreResult, TradeSide};

/// One executed (or attempted) trade, never mutated after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEntry {
    pub timestamp: DateTime<Utc>,
    pub side: TradeSide,
    pub input_token: String,
    pub output_token: String,
    pub in_amount: Amount,
    pub out_amount: Amount,
    pub expected_profit_pct: f64,
    pub actual_profit_pct: Option<f64>,
    pub slippage_bps: Decimal,
    pub tx_id: Option<String>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl TradeEntry {
    pub fn is_success(&self) -> bool {
        self.error_kind.is_none()
    }
}

/// Fields known before submission; completed into a [`TradeEntry`]
#[derive(Debug, Clone)]
pub struct TradeDraft {
    pub timestamp: DateTime<Utc>,
    pub side: TradeSide,
    pub input_token: String,
    pub output_token: String,
    pub in_amount: Amount,
    pub expected_out_amount: Amount,
    pub expected_profit_pct: f64,
    pub slippage_bps: Decimal,
}

impl TradeDraft {
    pub fn succeeded(
        &self,
        tx_id: String,
        out_amount: Amount,
        actual_profit_pct: f64,
        duration_ms: u64,
    ) -> TradeEntry {
        TradeEntry {
            timestamp: self.timestamp,
            side: self.side,
            input_token: self.input_token.clone(),
            output_token: self.output_token.clone(),
            in_amount: self.in_amount,
            out_amount,
            expected_profit_pct: self.expected_profit_pct,
            actual_profit_pct: Some(actual_profit_pct),
            slippage_bps: self.slippage_bps,
            tx_id: Some(tx_id),
            error_kind: None,
            error: None,
            duration_ms,
        }
    }

    /// `out_amount` is the measured output when one was observed, zero otherwise
    pub fn failed(
        &self,
        tx_id: Option<String>,
        out_amount: Amount,
        actual_profit_pct: Option<f64>,
        error_kind: &str,
        error: String,
        duration_ms: u64,
    ) -> TradeEntry {
        TradeEntry {
            timestamp: self.timestamp,
            side: self.side,
            input_token: self.input_token.clone(),
            output_token: self.output_token.clone(),
            in_amount: self.in_amount,
            out_amount,
            expected_profit_pct: self.expected_profit_pct,
            actual_profit_pct,
            slippage_bps: self.slippage_bps,
            tx_id,
            error_kind: Some(error_kind.to_string()),
            error: Some(error),
            duration_ms,
        }
    }
}

/// Append-only trade log, optionally mirrored to a JSON-lines file
#[derive(Debug, Default)]
pub struct TradeHistory {
    entries: Vec<TradeEntry>,
    sink: Option<PathBuf>,
}

impl TradeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(path: impl AsRef<Path>) -> Self {
        Self {
            entries: Vec::new(),
            sink: Some(path.as_ref().to_path_buf()),
        }
    }

    /// Record an entry. The in-memory log is always updated, even when
    /// writing to the sink fails.
    pub async fn append(&mut self, entry: TradeEntry) -> CoreResult<()> {
        let written = match &self.sink {
            Some(path) => write_line(path, &entry).await,
            None => Ok(()),
        };
        self.entries.push(entry);
        written
    }

    pub fn entries(&self) -> &[TradeEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TradeEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.entries.len() - self.success_count()
    }
}

async fn write_line(path: &Path, entry: &TradeEntry) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let mut line = serde_json::to_string(entry)
        .map_err(|e| CoreError::SerializationError(e.to_string()))?;
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> TradeDraft {
        TradeDraft {
            timestamp: Utc::now(),
            side: TradeSide::Buy,
            input_token: "USDC".to_string(),
            output_token: "USDC".to_string(),
            in_amount: Amount::from_u64(1_000_000),
            expected_out_amount: Amount::from_u64(1_010_000),
            expected_profit_pct: 1.0,
            slippage_bps: Decimal::from(120),
        }
    }

    #[tokio::test]
    async fn test_history_counts() {
        let mut history = TradeHistory::new();
        let d = draft();
        history
            .append(d.succeeded("sig1".into(), Amount::from_u64(1_008_000), 0.8, 900))
            .await
            .unwrap();
        history
            .append(d.failed(None, Amount::ZERO, None, "SubmissionRejected", "slippage".into(), 10))
            .await
            .unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.success_count(), 1);
        assert_eq!(history.failure_count(), 1);
        assert_eq!(history.last().unwrap().error_kind.as_deref(), Some("SubmissionRejected"));
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "jup-arb-{}-{}-{}",
            name,
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }

    #[tokio::test]
    async fn test_history_sink_appends_json_lines() {
        let dir = temp_path("history");
        let path = dir.join("trades.jsonl");
        let mut history = TradeHistory::with_sink(&path);
        let d = draft();
        history
            .append(d.succeeded("sig1".into(), Amount::from_u64(1_008_000), 0.8, 900))
            .await
            .unwrap();
        history
            .append(d.succeeded("sig2".into(), Amount::from_u64(1_004_000), 0.4, 700))
            .await
            .unwrap();

        let contents = fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: TradeEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.tx_id.as_deref(), Some("sig1"));
        assert_eq!(first.out_amount, Amount::from_u64(1_008_000));

        fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_entry_in_memory() {
        // a regular file where the parent directory should be
        let blocker = temp_path("blocker");
        fs::write(&blocker, b"").await.unwrap();

        let mut history = TradeHistory::with_sink(blocker.join("trades.jsonl"));
        let err = history
            .append(draft().succeeded("sig1".into(), Amount::from_u64(1_008_000), 0.8, 900))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::HistoryIo(_)));
        assert_eq!(history.len(), 1);

        fs::remove_file(&blocker).await.ok();
    }
}
