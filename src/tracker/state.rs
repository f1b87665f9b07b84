//! Transaction status state machine.
//!
//! # States
//! - Submitted: accepted by `eth_sendRawTransaction`, not yet seen again
//! - Pending: the node knows the hash, or a shallow receipt exists
//! - Confirmed / Failed: receipt is deep enough (terminal)
//! - Dropped: the node stopped knowing the hash (terminal)
//!
//! # State Transitions
//! ```text
//! Submitted → Pending → Confirmed | Failed
//! Submitted → Dropped
//! Pending   → Dropped
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{TxHash, U256};
use serde::Serialize;

use crate::tracker::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Submitted,
    Pending,
    Confirmed,
    Failed,
    Dropped,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed | TxStatus::Dropped)
    }

    pub fn can_transition_to(self, next: TxStatus) -> bool {
        use TxStatus::*;
        matches!(
            (self, next),
            (Submitted, Pending)
                | (Submitted, Dropped)
                | (Pending, Confirmed)
                | (Pending, Failed)
                | (Pending, Dropped)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxStatus::Submitted => "submitted",
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
            TxStatus::Dropped => "dropped",
        }
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub from: TxStatus,
    pub to: TxStatus,
    /// Unix seconds.
    pub at: u64,
}

/// Everything known about one broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub hash: TxHash,
    pub nonce: U256,
    pub status: TxStatus,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
    /// Unix seconds.
    pub submitted_at: u64,
    pub last_checked_at: Option<u64>,
    pub poll_count: u32,
    /// Consecutive polls in which the node did not know the hash.
    pub unseen_polls: u32,
    pub history: Vec<StatusChange>,
}

impl TransactionRecord {
    pub fn new(hash: TxHash, nonce: U256) -> Self {
        Self {
            hash,
            nonce,
            status: TxStatus::Submitted,
            block_number: None,
            gas_used: None,
            submitted_at: unix_now(),
            last_checked_at: None,
            poll_count: 0,
            unseen_polls: 0,
            history: Vec::new(),
        }
    }

    /// Move to `next`, appending to the history.
    pub fn transition(&mut self, next: TxStatus) -> Result<StatusChange, TrackerError> {
        if !self.status.can_transition_to(next) {
            return Err(TrackerError::InvalidTransition {
                hash: self.hash,
                from: self.status,
                to: next,
            });
        }
        let change = StatusChange {
            from: self.status,
            to: next,
            at: unix_now(),
        };
        self.status = next;
        self.history.push(change.clone());
        Ok(change)
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
