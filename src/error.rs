//! Error taxonomy shared by every subsystem.
//!
//! Each subsystem owns its error enum; this module only defines how
//! callers should react to an error, independent of where it came from.

use serde::Serialize;

/// What the caller is allowed to do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad input (address, amount, mnemonic). Never retried.
    Validation,
    /// Wrong credential, corrupted record, signing failure. Never retried automatically.
    Security,
    /// Timeout, connection refused, rate limited. Safe to retry with backoff.
    Transport,
    /// Node rejected the transaction. Rebuild with corrected parameters first.
    ChainRejection,
}

impl ErrorCategory {
    /// Whether the identical operation may be attempted again.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(ErrorCategory::Transport.is_retryable());
        assert!(!ErrorCategory::Validation.is_retryable());
        assert!(!ErrorCategory::Security.is_retryable());
        assert!(!ErrorCategory::ChainRejection.is_retryable());
    }
}
