//! Authorization gate consulted before a key is unlocked.
//!
//! The gate stands in for whatever the host uses to confirm presence
//! (biometrics, hardware button, a CLI prompt). Its only output is a token
//! for one wallet id or a denial.

use async_trait::async_trait;
use thiserror::Error;

/// Proof that the gate approved access to one wallet.
#[derive(Debug, Clone)]
pub struct AuthorizationToken {
    wallet_id: String,
}

impl AuthorizationToken {
    pub fn grant(wallet_id: impl Into<String>) -> Self {
        Self {
            wallet_id: wallet_id.into(),
        }
    }

    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("authorization denied: {0}")]
pub struct AuthorizationDenied(pub String);

#[async_trait]
pub trait AuthorizationGate: Send + Sync {
    async fn authorize(&self, wallet_id: &str) -> Result<AuthorizationToken, AuthorizationDenied>;
}

/// Approves every request. For headless use where the credential is the
/// only factor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AuthorizationGate for AllowAll {
    async fn authorize(&self, wallet_id: &str) -> Result<AuthorizationToken, AuthorizationDenied> {
        Ok(AuthorizationToken::grant(wallet_id))
    }
}
