//! End-to-end send pipeline.
//!
//! # Data Flow
//! ```text
//! WalletContext::send(request, credential)
//!     → balance (RpcClient)
//!     → TransactionBuilder (validate, reserve nonce, estimate gas, fees)
//!     → AuthorizationGate + KeyVault (single-use unlock)
//!     → Signer
//!     → RpcClient broadcast (ambiguous timeouts resolved by hash lookup)
//!     → commit nonce, register with TransactionTracker, publish event
//! ```

pub mod context;
pub mod events;

pub use context::WalletContext;
pub use events::{EventBus, PipelineEvent};

use alloy::primitives::{Address, TxHash};
use thiserror::Error;

use crate::config::ConfigError;
use crate::error::ErrorCategory;
use crate::keys::KeyError;
use crate::rpc::RpcError;
use crate::tracker::TrackerError;
use crate::transaction::{BuildError, SignError};
use crate::vault::VaultError;

/// Any failure surfaced by the wallet pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("signing is blocked for wallet '{0}' until it is re-authorized")]
    SigningBlocked(String),

    #[error("transaction {0} is already final and cannot be replaced")]
    AlreadyFinal(TxHash),

    #[error("unlocked key controls {actual}, wallet context is for {expected}")]
    WalletMismatch { expected: Address, actual: Address },

    #[error("environment variable {0} is not set or empty")]
    MissingSecret(&'static str),
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::Key(e) => e.category(),
            PipelineError::Vault(e) => e.category(),
            PipelineError::Build(e) => e.category(),
            PipelineError::Sign(e) => e.category(),
            PipelineError::Rpc(e) => e.category(),
            PipelineError::Tracker(e) => e.category(),
            PipelineError::Config(_)
            | PipelineError::AlreadyFinal(_)
            | PipelineError::MissingSecret(_) => ErrorCategory::Validation,
            PipelineError::SigningBlocked(_) | PipelineError::WalletMismatch { .. } => {
                ErrorCategory::Security
            }
        }
    }

    /// One line the user can act on.
    pub fn hint(&self) -> &'static str {
        match self {
            PipelineError::Key(_) => "check the recovery phrase, address or derivation path",
            PipelineError::Vault(e) => e.hint(),
            PipelineError::Build(e) => e.hint(),
            PipelineError::Sign(e) => e.hint(),
            PipelineError::Rpc(e) => e.hint(),
            PipelineError::Tracker(e) => e.hint(),
            PipelineError::Config(_) => "fix the configuration file",
            PipelineError::SigningBlocked(_) => "unlock the wallet again to resume signing",
            PipelineError::AlreadyFinal(_) => {
                "the transaction is already confirmed, failed or dropped"
            }
            PipelineError::WalletMismatch { .. } => "the stored key does not belong to this wallet",
            PipelineError::MissingSecret(_) => {
                "export WALLET_CREDENTIAL (and WALLET_MNEMONIC for import)"
            }
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
