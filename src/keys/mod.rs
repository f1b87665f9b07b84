//! Deterministic key derivation.
//!
//! # Data Flow
//! ```text
//! OsRng entropy (128..=256 bits)
//!     → mnemonic.rs (BIP-39 words + checksum)
//!     → mnemonic.rs (PBKDF2-HMAC-SHA512 seed)
//!     → derivation.rs (BIP-32 path m/44'/60'/account'/0/index)
//!     → address.rs (keccak256 of uncompressed public key)
//! ```
//!
//! # Security Constraints
//! - Pure functions over byte buffers, no I/O
//! - Mnemonic, seed and private key buffers are zeroized on drop
//! - None of these types print their secret in `Debug`

pub mod address;
pub mod derivation;
pub mod mnemonic;

pub use address::{derive_address, parse_address, to_checksum};
pub use derivation::{
    derive_account, derive_public_key, DerivationPath, DerivedAccount, PrivateKey, PublicKey,
};
pub use mnemonic::{entropy_bits_for_words, generate_mnemonic, mnemonic_to_seed, Mnemonic, Seed};

use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors produced while deriving keys or parsing key-related input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Entropy size is not 128, 160, 192, 224 or 256 bits.
    #[error("invalid entropy length: {0} bits (expected 128, 160, 192, 224 or 256)")]
    InvalidEntropyLength(usize),

    /// Mnemonic does not have 12, 15, 18, 21 or 24 words.
    #[error("invalid mnemonic word count: {0} (expected 12, 15, 18, 21 or 24)")]
    InvalidWordCount(usize),

    /// A mnemonic word is not in the BIP-39 English list.
    #[error("unknown mnemonic word '{0}'")]
    UnknownWord(String),

    /// The checksum bits of the final word do not match the entropy.
    #[error("mnemonic checksum does not match")]
    InvalidChecksum,

    /// Derivation path could not be parsed.
    #[error("invalid derivation path '{path}': {reason}")]
    InvalidDerivationPath { path: String, reason: String },

    /// BIP-32 child derivation failed.
    #[error("key derivation failed: {0}")]
    DerivationFailed(String),

    /// Bytes are not a valid secp256k1 scalar.
    #[error("invalid private key")]
    InvalidPrivateKey,

    /// Address string is malformed or fails its EIP-55 checksum.
    #[error("invalid address '{input}': {reason}")]
    InvalidAddress { input: String, reason: &'static str },
}

impl KeyError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            KeyError::InvalidPrivateKey | KeyError::DerivationFailed(_) => ErrorCategory::Security,
            _ => ErrorCategory::Validation,
        }
    }
}

/// Result type for key derivation.
pub type KeyResult<T> = Result<T, KeyError>;
