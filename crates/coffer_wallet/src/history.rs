//! Per-address transaction log.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use coffer_core::Store;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

/// How a pending transaction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Success,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: String,
    pub from: String,
    pub to: String,
    /// Human decimal amount as entered.
    pub value: String,
    pub timestamp: DateTime<Utc>,
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Token contract for ERC-20 transfers, `None` for native ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl TransactionRecord {
    pub fn pending(
        hash: String,
        from: String,
        to: String,
        value: String,
        token: Option<String>,
    ) -> Self {
        Self {
            hash,
            from,
            to,
            value,
            timestamp: Utc::now(),
            status: TxStatus::Pending,
            error_message: None,
            token,
        }
    }

    /// Move out of `Pending`. Returns `false` (and changes nothing) if the
    /// record is already terminal.
    pub fn resolve(&mut self, outcome: TxOutcome) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match outcome {
            TxOutcome::Success => self.status = TxStatus::Success,
            TxOutcome::Failed(message) => {
                self.status = TxStatus::Failed;
                self.error_message = Some(message);
            }
        }
        true
    }
}

fn log_key(address: &str) -> String {
    format!("tx.{}", address.to_ascii_lowercase())
}

/// Newest-first transaction logs, one per originating address.
#[derive(Clone)]
pub struct TransactionLog {
    store: Arc<Store>,
}

impl TransactionLog {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Transactions sent from `address`, newest first.
    pub fn history(&self, address: &str) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .store
            .get_json::<Vec<TransactionRecord>>(&log_key(address))?
            .unwrap_or_default())
    }

    pub fn pending(&self, address: &str) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .history(address)?
            .into_iter()
            .filter(|r| r.status == TxStatus::Pending)
            .collect())
    }

    /// Prepend a freshly submitted record to its sender's log. A hash that
    /// is already logged is left as it is.
    pub fn record_pending(&self, record: TransactionRecord) -> Result<()> {
        let key = log_key(&record.from);
        let hash = record.hash.clone();
        let inserted = self.store.update_json(&key, |log: &mut Vec<TransactionRecord>| {
            if log.iter().any(|r| r.hash.eq_ignore_ascii_case(&record.hash)) {
                return false;
            }
            log.insert(0, record);
            true
        })?;
        if inserted {
            info!(tx_hash = %hash, "pending transaction recorded");
        } else {
            debug!(tx_hash = %hash, "transaction already recorded");
        }
        Ok(())
    }

    /// Apply outcomes to pending records of `address`. Returns how many
    /// records changed; terminal records and unknown hashes are skipped.
    pub fn resolve_many(&self, address: &str, outcomes: Vec<(String, TxOutcome)>) -> Result<usize> {
        if outcomes.is_empty() {
            return Ok(0);
        }
        let resolved = self
            .store
            .update_json(&log_key(address), |log: &mut Vec<TransactionRecord>| {
                let mut changed = Vec::new();
                for (hash, outcome) in outcomes {
                    if let Some(record) = log.iter_mut().find(|r| r.hash == hash) {
                        if record.resolve(outcome) {
                            changed.push((hash, record.status));
                        }
                    }
                }
                changed
            })?;
        for (hash, status) in &resolved {
            info!(tx_hash = %hash, status = ?status, "transaction resolved");
        }
        Ok(resolved.len())
    }
}
