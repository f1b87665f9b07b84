//! Transaction construction and signing.
//!
//! # Data Flow
//! ```text
//! TransactionRequest (user input)
//!     → builder.rs: validate recipient and amount
//!     → nonce.rs: reserve the account's next nonce (per-account lock)
//!     → ChainRpc: estimate gas, fetch fees
//!     → UnsignedTransaction
//!     → signer.rs: EIP-155 / EIP-1559 signing hash, RFC 6979 ECDSA
//!     → SignedTransaction (raw EIP-2718 bytes + hash)
//! ```

pub mod builder;
pub mod nonce;
pub mod signer;
pub mod types;

pub use builder::{Replacement, TransactionBuilder};
pub use nonce::{NonceManager, NonceReservation};
pub use signer::{recover_signer, sign};
pub use types::{
    parse_amount, AccountState, Fee, SignedTransaction, TransactionRequest, UnsignedTransaction,
    GWEI,
};

use thiserror::Error;

use crate::error::ErrorCategory;
use crate::resilience::Retryable;
use crate::rpc::RpcError;

/// Errors raised while assembling a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("invalid amount {0}")]
    InvalidAmount(String),

    #[error("gas estimation failed: {0}")]
    GasEstimationFailed(#[source] RpcError),

    #[error("nonce resolution failed: {0}")]
    NonceResolutionFailed(#[source] RpcError),

    #[error("fee resolution failed: {0}")]
    FeeResolutionFailed(#[source] RpcError),

    #[error("gas price too high: {current_gwei} gwei > {max_gwei} gwei max")]
    FeeTooHigh { current_gwei: u64, max_gwei: u64 },

    #[error("invalid gas limit: {0}")]
    InvalidGasLimit(String),
}

impl BuildError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BuildError::GasEstimationFailed(e)
            | BuildError::NonceResolutionFailed(e)
            | BuildError::FeeResolutionFailed(e) => e.category(),
            _ => ErrorCategory::Validation,
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            BuildError::InvalidRecipient(_) => "check the recipient address",
            BuildError::InvalidAmount(_) => {
                "enter a valid, non-negative amount within your balance"
            }
            BuildError::GasEstimationFailed(RpcError::Response { .. }) => {
                "the transaction would fail on chain; check recipient and data"
            }
            BuildError::GasEstimationFailed(e)
            | BuildError::NonceResolutionFailed(e)
            | BuildError::FeeResolutionFailed(e) => e.hint(),
            BuildError::FeeTooHigh { .. } => "network fees are unusually high; try again later",
            BuildError::InvalidGasLimit(_) => "gas limit must be at least 21000",
        }
    }
}

impl Retryable for BuildError {
    fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Result type for building.
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors raised while signing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignError {
    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("signing key does not control {expected}")]
    KeyMismatch {
        expected: alloy::primitives::Address,
    },

    #[error("{0} does not fit its wire encoding")]
    FieldOverflow(&'static str),
}

impl SignError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SignError::FieldOverflow(_) => ErrorCategory::Validation,
            SignError::SigningFailed(_) | SignError::KeyMismatch { .. } => ErrorCategory::Security,
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            SignError::FieldOverflow(_) => "a transaction field is out of range",
            SignError::SigningFailed(_) | SignError::KeyMismatch { .. } => {
                "signing failed; unlock the wallet again before retrying"
            }
        }
    }
}

/// Result type for signing.
pub type SignResult<T> = Result<T, SignError>;
