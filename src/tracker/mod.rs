//! Lifecycle tracking of broadcast transactions.
//!
//! # Data Flow
//! ```text
//! broadcast accepted
//!     → register (Submitted)
//!     → monitor.rs poll cycle: receipt? depth? hash still known?
//!     → state.rs transition (history, metrics, event bus)
//!     → repeat with backoff until terminal or shutdown
//! ```

pub mod monitor;
pub mod state;

pub use monitor::TransactionTracker;
pub use state::{StatusChange, TransactionRecord, TxStatus};

use alloy::primitives::TxHash;
use thiserror::Error;

use crate::error::ErrorCategory;
use crate::rpc::RpcError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("transaction {0} is not tracked")]
    UnknownTransaction(TxHash),

    #[error("invalid status transition for {hash}: {from} -> {to}")]
    InvalidTransition {
        hash: TxHash,
        from: TxStatus,
        to: TxStatus,
    },

    #[error("status poll failed: {0}")]
    Rpc(#[from] RpcError),
}

impl TrackerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TrackerError::UnknownTransaction(_) | TrackerError::InvalidTransition { .. } => {
                ErrorCategory::Validation
            }
            TrackerError::Rpc(e) => e.category(),
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            TrackerError::UnknownTransaction(_) => {
                "this transaction was not sent from this wallet session"
            }
            TrackerError::InvalidTransition { .. } => "the transaction status is already final",
            TrackerError::Rpc(e) => e.hint(),
        }
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
