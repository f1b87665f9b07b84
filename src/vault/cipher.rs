//! Argon2id key stretching and AES-256-GCM sealing.
//!
//! Both functions are CPU-heavy and synchronous; async callers run them on
//! the blocking pool.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::config::VaultConfig;
use crate::keys::PrivateKey;
use crate::vault::record::{EncryptedKeyRecord, IV_LEN, RECORD_VERSION, SALT_LEN};
use crate::vault::{Credential, VaultError, VaultResult};

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub iterations: u32,
    pub memory_kib: u32,
    pub parallelism: u32,
}

impl From<&VaultConfig> for KdfParams {
    fn from(config: &VaultConfig) -> Self {
        Self {
            iterations: config.kdf_iterations,
            memory_kib: config.kdf_memory_kib,
            parallelism: config.kdf_parallelism,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::from(&VaultConfig::default())
    }
}

fn derive_key(
    credential: &Credential,
    salt: &[u8],
    params: KdfParams,
) -> VaultResult<Zeroizing<[u8; 32]>> {
    let argon2_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(credential.expose(), salt, &mut key[..])
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;
    Ok(key)
}

/// Encrypt `key` for `wallet_id` under a fresh salt and IV.
pub fn seal(
    wallet_id: &str,
    key: &PrivateKey,
    credential: &Credential,
    params: KdfParams,
) -> VaultResult<EncryptedKeyRecord> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let encryption_key = derive_key(credential, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(&encryption_key[..])
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    let cipher_text = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: key.as_bytes(),
                aad: wallet_id.as_bytes(),
            },
        )
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedKeyRecord {
        version: RECORD_VERSION,
        wallet_id: wallet_id.to_string(),
        cipher_text,
        iv: iv.to_vec(),
        salt: salt.to_vec(),
        kdf_iterations: params.iterations,
        kdf_memory_kib: params.memory_kib,
        kdf_parallelism: params.parallelism,
    })
}

/// Decrypt `record` using the KDF parameters stored in it.
///
/// The tag also covers the wallet id, so a record copied under another id
/// fails like a wrong credential.
pub fn open(record: &EncryptedKeyRecord, credential: &Credential) -> VaultResult<PrivateKey> {
    let params = KdfParams {
        iterations: record.kdf_iterations,
        memory_kib: record.kdf_memory_kib,
        parallelism: record.kdf_parallelism,
    };
    let encryption_key = derive_key(credential, &record.salt, params)
        .map_err(|_| VaultError::AuthenticationFailed)?;
    let cipher = Aes256Gcm::new_from_slice(&encryption_key[..])
        .map_err(|_| VaultError::AuthenticationFailed)?;

    if record.iv.len() != IV_LEN {
        return Err(VaultError::AuthenticationFailed);
    }
    let plain = cipher
        .decrypt(
            Nonce::from_slice(&record.iv),
            Payload {
                msg: &record.cipher_text,
                aad: record.wallet_id.as_bytes(),
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| VaultError::AuthenticationFailed)?;

    PrivateKey::from_bytes(&plain).map_err(|_| VaultError::AuthenticationFailed)
}
