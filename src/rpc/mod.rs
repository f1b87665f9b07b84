//! JSON-RPC transport to the chain.
//!
//! # Data Flow
//! ```text
//! caller (builder, pipeline, tracker)
//!     → ChainRpc trait
//!     → client.rs: rate_limit.rs token bucket (fail fast when empty)
//!     → tokio timeout around the alloy HTTP call
//!     → error classification (transport vs structured rejection)
//! ```
//!
//! # Design Decisions
//! - One bucket per endpoint, shared by every clone of the client
//! - No internal retries; callers own their backoff policy
//! - Rejections from `eth_sendRawTransaction` are typed separately from
//!   transport failures, because only the latter may be resent unchanged
//! - Quantities are widened to `U256` at this boundary

pub mod client;
#[cfg(test)]
pub(crate) mod mock;
pub mod rate_limit;
pub mod types;

pub use client::RpcClient;
pub use rate_limit::RateLimiter;
pub use types::{CallRequest, Receipt, RejectionKind};

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use thiserror::Error;

use crate::error::ErrorCategory;
use crate::resilience::Retryable;
use crate::transaction::SignedTransaction;

/// Errors that can occur while talking to the node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Local token bucket is empty; nothing was sent.
    #[error("RPC rate limit exceeded ({method})")]
    RateLimitExceeded { method: &'static str },

    /// Timeout or transport failure. The call may be repeated unchanged.
    #[error("RPC connection failed during {method}: {reason}")]
    ConnectionFailed {
        method: &'static str,
        timed_out: bool,
        reason: String,
    },

    /// The node refused a raw transaction.
    #[error("transaction rejected by node (code {code}): {reason}")]
    TransactionRejected {
        kind: RejectionKind,
        code: i64,
        reason: String,
    },

    /// Structured error response to a read call (e.g. a reverting estimate).
    #[error("RPC error {code} during {method}: {message}")]
    Response {
        method: &'static str,
        code: i64,
        message: String,
    },

    /// Node answered with something we could not interpret.
    #[error("invalid RPC response for {method}: {reason}")]
    InvalidResponse { method: &'static str, reason: String },

    /// Endpoint serves a different chain than configured.
    #[error("chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Endpoint URL could not be parsed.
    #[error("invalid RPC URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

impl RpcError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RpcError::RateLimitExceeded { .. }
            | RpcError::ConnectionFailed { .. }
            | RpcError::InvalidResponse { .. } => ErrorCategory::Transport,
            RpcError::TransactionRejected { .. } => ErrorCategory::ChainRejection,
            RpcError::Response { .. }
            | RpcError::ChainMismatch { .. }
            | RpcError::InvalidEndpoint { .. } => ErrorCategory::Validation,
        }
    }

    /// True for failures where the request may or may not have reached the node.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, RpcError::ConnectionFailed { .. })
    }

    /// What the user should do next.
    pub fn hint(&self) -> &'static str {
        match self {
            RpcError::RateLimitExceeded { .. } => "too many requests; try again in a moment",
            RpcError::ConnectionFailed { .. } | RpcError::InvalidResponse { .. } => {
                "the network is unreachable right now; retry"
            }
            RpcError::TransactionRejected { kind, .. } => kind.hint(),
            RpcError::Response { .. } => {
                "the node refused the request; check the transaction parameters"
            }
            RpcError::ChainMismatch { .. } => "the RPC endpoint serves a different network",
            RpcError::InvalidEndpoint { .. } => "fix the RPC URL in the configuration",
        }
    }
}

impl Retryable for RpcError {
    fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// The node operations the pipeline depends on.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// `eth_chainId`
    async fn get_chain_id(&self) -> RpcResult<u64>;

    /// `eth_blockNumber`
    async fn get_block_number(&self) -> RpcResult<u64>;

    /// `eth_getBalance` at latest.
    async fn get_balance(&self, address: Address) -> RpcResult<U256>;

    /// `eth_getTransactionCount` at pending: the next nonce the node expects.
    async fn get_nonce(&self, address: Address) -> RpcResult<U256>;

    /// `eth_gasPrice`
    async fn get_gas_price(&self) -> RpcResult<U256>;

    /// `eth_maxPriorityFeePerGas`
    async fn get_max_priority_fee(&self) -> RpcResult<U256>;

    /// `eth_estimateGas`
    async fn estimate_gas(&self, call: &CallRequest) -> RpcResult<U256>;

    /// `eth_sendRawTransaction`. Resending accepted bytes returns the same hash.
    async fn broadcast(&self, tx: &SignedTransaction) -> RpcResult<TxHash>;

    /// `eth_getTransactionReceipt`; `None` while unmined.
    async fn get_receipt(&self, hash: TxHash) -> RpcResult<Option<Receipt>>;

    /// `eth_getTransactionByHash` is non-null.
    async fn is_transaction_known(&self, hash: TxHash) -> RpcResult<bool>;
}
