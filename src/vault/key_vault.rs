//! The vault façade: locking, encryption and storage together.

use std::sync::Arc;

use alloy::primitives::Address;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use zeroize::Zeroizing;

use crate::config::VaultConfig;
use crate::keys::PrivateKey;
use crate::vault::auth::AuthorizationGate;
use crate::vault::cipher::{self, KdfParams};
use crate::vault::storage::{FileKeyStorage, KeyStorage};
use crate::vault::{validate_wallet_id, Credential, VaultError, VaultResult};

/// Encrypted key store with one lock per wallet id.
pub struct KeyVault {
    storage: Arc<dyn KeyStorage>,
    kdf: KdfParams,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyVault {
    pub fn new(storage: Arc<dyn KeyStorage>, kdf: KdfParams) -> Self {
        Self {
            storage,
            kdf,
            locks: DashMap::new(),
        }
    }

    /// File-backed vault at `config.path`.
    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(
            Arc::new(FileKeyStorage::new(&config.path)),
            KdfParams::from(config),
        )
    }

    async fn lock(&self, wallet_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(wallet_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Encrypt `key` under `credential` and persist it, replacing any
    /// earlier record for `wallet_id`.
    pub async fn store(
        &self,
        wallet_id: &str,
        key: &PrivateKey,
        credential: &Credential,
    ) -> VaultResult<()> {
        validate_wallet_id(wallet_id)?;
        if credential.expose().is_empty() {
            return Err(VaultError::EmptyCredential);
        }
        let _guard = self.lock(wallet_id).await;

        let id = wallet_id.to_string();
        let key_bytes = Zeroizing::new(*key.as_bytes());
        let credential = credential.clone();
        let kdf = self.kdf;

        let record = tokio::task::spawn_blocking(move || {
            let key = PrivateKey::from_bytes(key_bytes.as_slice())
                .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;
            cipher::seal(&id, &key, &credential, kdf)
        })
        .await
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))??;

        self.storage.save(&record).await?;
        tracing::info!(wallet_id, "Key stored");
        Ok(())
    }

    /// Decrypt the key for `wallet_id`.
    ///
    /// The returned guard keeps the wallet locked until it is used or dropped.
    pub async fn retrieve(
        &self,
        wallet_id: &str,
        credential: &Credential,
    ) -> VaultResult<UnlockedKey> {
        validate_wallet_id(wallet_id)?;
        let guard = self.lock(wallet_id).await;

        let record = self
            .storage
            .load(wallet_id)
            .await?
            .ok_or_else(|| VaultError::RecordNotFound(wallet_id.to_string()))?;

        let credential = credential.clone();
        let key = tokio::task::spawn_blocking(move || cipher::open(&record, &credential))
            .await
            .map_err(|_| VaultError::AuthenticationFailed)?
            .inspect_err(|_| tracing::warn!(wallet_id, "Vault unlock failed"))?;

        let address = key.address().map_err(|_| VaultError::AuthenticationFailed)?;
        tracing::debug!(wallet_id, address = %address, "Key unlocked");

        Ok(UnlockedKey {
            wallet_id: wallet_id.to_string(),
            address,
            key,
            _guard: guard,
        })
    }

    /// Ask `gate` first, then decrypt.
    pub async fn unlock(
        &self,
        gate: &dyn AuthorizationGate,
        wallet_id: &str,
        credential: &Credential,
    ) -> VaultResult<UnlockedKey> {
        let token = gate.authorize(wallet_id).await.map_err(|e| {
            tracing::warn!(wallet_id, reason = %e, "Authorization denied");
            VaultError::AuthenticationFailed
        })?;
        if token.wallet_id() != wallet_id {
            tracing::warn!(
                wallet_id,
                token_wallet = token.wallet_id(),
                "Token issued for another wallet"
            );
            return Err(VaultError::AuthenticationFailed);
        }
        self.retrieve(wallet_id, credential).await
    }

    pub async fn delete(&self, wallet_id: &str) -> VaultResult<()> {
        validate_wallet_id(wallet_id)?;
        let _guard = self.lock(wallet_id).await;

        if !self.storage.remove(wallet_id).await? {
            return Err(VaultError::RecordNotFound(wallet_id.to_string()));
        }
        tracing::info!(wallet_id, "Key deleted");
        Ok(())
    }

    pub async fn list(&self) -> VaultResult<Vec<String>> {
        self.storage.list().await
    }

    pub async fn contains(&self, wallet_id: &str) -> VaultResult<bool> {
        Ok(self.storage.load(wallet_id).await?.is_some())
    }
}

impl std::fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVault")
            .field("kdf", &self.kdf)
            .finish_non_exhaustive()
    }
}

/// A decrypted key, usable exactly once.
pub struct UnlockedKey {
    wallet_id: String,
    address: Address,
    key: PrivateKey,
    _guard: OwnedMutexGuard<()>,
}

impl UnlockedKey {
    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Run `f` with the key, then wipe it and release the wallet lock.
    pub fn use_once<R>(self, f: impl FnOnce(&PrivateKey) -> R) -> R {
        f(&self.key)
    }
}

impl std::fmt::Debug for UnlockedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockedKey")
            .field("wallet_id", &self.wallet_id)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
