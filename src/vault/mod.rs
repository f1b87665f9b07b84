//! Encrypted at-rest key storage.
//!
//! # Data Flow
//! ```text
//! store:    PrivateKey + Credential
//!     → cipher.rs (Argon2id → AES-256-GCM, wallet id as AAD)
//!     → record.rs (EncryptedKeyRecord JSON)
//!     → storage.rs (atomic file write / memory)
//!
//! retrieve: Credential
//!     → per-wallet lock
//!     → storage.rs → cipher.rs
//!     → UnlockedKey (single use, zeroized on drop)
//! ```
//!
//! # Security
//! - Wrong credential, corruption and tampering all surface as `AuthenticationFailed`
//! - Decrypted keys never leave `UnlockedKey::use_once`

pub mod auth;
pub mod cipher;
pub mod key_vault;
pub mod record;
pub mod storage;

pub use auth::{AllowAll, AuthorizationDenied, AuthorizationGate, AuthorizationToken};
pub use cipher::KdfParams;
pub use key_vault::{KeyVault, UnlockedKey};
pub use record::EncryptedKeyRecord;
pub use storage::{FileKeyStorage, KeyStorage, MemoryKeyStorage};

use thiserror::Error;
use zeroize::Zeroizing;

use crate::error::ErrorCategory;

/// Errors returned by the vault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("no key stored for wallet '{0}'")]
    RecordNotFound(String),

    /// Wrong credential, denied authorization, or a damaged record.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("key storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("invalid wallet id '{0}'")]
    InvalidWalletId(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("credential must not be empty")]
    EmptyCredential,
}

impl VaultError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            VaultError::RecordNotFound(_)
            | VaultError::InvalidWalletId(_)
            | VaultError::EmptyCredential => ErrorCategory::Validation,
            VaultError::AuthenticationFailed | VaultError::EncryptionFailed(_) => {
                ErrorCategory::Security
            }
            VaultError::StorageUnavailable(_) => ErrorCategory::Transport,
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            VaultError::RecordNotFound(_) => "import or create the wallet first",
            VaultError::AuthenticationFailed => "wrong credential or damaged key file",
            VaultError::EmptyCredential => "choose a non-empty credential to protect the key",
            VaultError::StorageUnavailable(_) => {
                "the key store cannot be read or written; check disk and permissions"
            }
            VaultError::InvalidWalletId(_) => "wallet ids use letters, digits, '-' and '_' only",
            VaultError::EncryptionFailed(_) => {
                "the key could not be encrypted; check vault settings"
            }
        }
    }
}

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Longest accepted wallet id.
pub const MAX_WALLET_ID_LEN: usize = 64;

/// Wallet ids become file names, so only a path-safe alphabet is accepted.
pub fn validate_wallet_id(wallet_id: &str) -> VaultResult<()> {
    let valid = !wallet_id.is_empty()
        && wallet_id.len() <= MAX_WALLET_ID_LEN
        && wallet_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(VaultError::InvalidWalletId(wallet_id.to_string()))
    }
}

/// Secret that unlocks a vault record (password or PIN).
#[derive(Clone)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}
