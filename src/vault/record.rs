//! On-disk record format.

use serde::{Deserialize, Serialize};

use crate::vault::{VaultError, VaultResult};

/// Current record layout.
pub const RECORD_VERSION: u32 = 1;

/// AES-GCM nonce length.
pub const IV_LEN: usize = 12;

/// Argon2 salt length.
pub const SALT_LEN: usize = 16;

/// 32-byte key plus 16-byte GCM tag.
pub const CIPHER_TEXT_LEN: usize = 48;

/// Highest Argon2 time cost accepted from a record or config.
pub const MAX_KDF_ITERATIONS: u32 = 16;

/// Highest Argon2 memory cost accepted, 1 GiB.
pub const MAX_KDF_MEMORY_KIB: u32 = 1 << 20;

/// Highest Argon2 lane count accepted.
pub const MAX_KDF_PARALLELISM: u32 = 16;

/// One encrypted private key.
///
/// ```json
/// {"version":1,"walletId":"main","cipherText":"…","iv":"…","salt":"…",
///  "kdfIterations":3,"kdfMemoryKib":65536,"kdfParallelism":1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedKeyRecord {
    pub version: u32,
    pub wallet_id: String,
    #[serde(with = "hex_bytes")]
    pub cipher_text: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub iv: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
    pub kdf_iterations: u32,
    pub kdf_memory_kib: u32,
    pub kdf_parallelism: u32,
}

impl EncryptedKeyRecord {
    pub fn to_json(&self) -> VaultResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| VaultError::StorageUnavailable(e.to_string()))
    }

    /// Parse and sanity-check a stored record.
    ///
    /// Anything malformed is reported as `AuthenticationFailed` so a damaged
    /// file looks the same as a wrong credential.
    pub fn from_json(bytes: &[u8]) -> VaultResult<Self> {
        let record: Self = serde_json::from_slice(bytes).map_err(|e| {
            tracing::warn!(error = %e, "Unreadable vault record");
            VaultError::AuthenticationFailed
        })?;
        record.check_shape()?;
        Ok(record)
    }

    fn check_shape(&self) -> VaultResult<()> {
        let well_formed = self.version == RECORD_VERSION
            && self.iv.len() == IV_LEN
            && self.salt.len() == SALT_LEN
            && self.cipher_text.len() == CIPHER_TEXT_LEN
            && (1..=MAX_KDF_ITERATIONS).contains(&self.kdf_iterations)
            && (1..=MAX_KDF_PARALLELISM).contains(&self.kdf_parallelism)
            && (8 * self.kdf_parallelism..=MAX_KDF_MEMORY_KIB).contains(&self.kdf_memory_kib);

        if well_formed {
            Ok(())
        } else {
            tracing::warn!(
                wallet_id = %self.wallet_id,
                version = self.version,
                "Malformed vault record"
            );
            Err(VaultError::AuthenticationFailed)
        }
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
