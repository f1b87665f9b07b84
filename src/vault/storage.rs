//! Record persistence backends.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::io::AsyncWriteExt;

use crate::vault::record::EncryptedKeyRecord;
use crate::vault::{validate_wallet_id, VaultError, VaultResult};

/// Where encrypted records live.
#[async_trait]
pub trait KeyStorage: Send + Sync {
    async fn load(&self, wallet_id: &str) -> VaultResult<Option<EncryptedKeyRecord>>;

    /// Insert or replace the record for `record.wallet_id`.
    async fn save(&self, record: &EncryptedKeyRecord) -> VaultResult<()>;

    /// Returns whether a record existed.
    async fn remove(&self, wallet_id: &str) -> VaultResult<bool>;

    /// Stored wallet ids, sorted.
    async fn list(&self) -> VaultResult<Vec<String>>;
}

/// One `<wallet_id>.json` file per wallet in a directory.
#[derive(Debug, Clone)]
pub struct FileKeyStorage {
    dir: PathBuf,
}

const RECORD_EXTENSION: &str = "json";

impl FileKeyStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, wallet_id: &str) -> VaultResult<PathBuf> {
        validate_wallet_id(wallet_id)?;
        Ok(self.dir.join(format!("{}.{}", wallet_id, RECORD_EXTENSION)))
    }
}

fn unavailable(action: &str, path: &Path, e: std::io::Error) -> VaultError {
    tracing::error!(path = %path.display(), error = %e, "Key storage {} failed", action);
    VaultError::StorageUnavailable(format!("{} {}: {}", action, path.display(), e))
}

#[async_trait]
impl KeyStorage for FileKeyStorage {
    async fn load(&self, wallet_id: &str) -> VaultResult<Option<EncryptedKeyRecord>> {
        let path = self.record_path(wallet_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => EncryptedKeyRecord::from_json(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable("read", &path, e)),
        }
    }

    /// Write to a temp file, fsync, then rename over the old record.
    async fn save(&self, record: &EncryptedKeyRecord) -> VaultResult<()> {
        let path = self.record_path(&record.wallet_id)?;
        let tmp_path = self.dir.join(format!(".{}.{}.tmp", record.wallet_id, RECORD_EXTENSION));
        let bytes = record.to_json()?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| unavailable("create", &self.dir, e))?;

        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| unavailable("create", &tmp_path, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| unavailable("write", &tmp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| unavailable("sync", &tmp_path, e))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| unavailable("rename", &path, e))?;

        tracing::debug!(
            wallet_id = %record.wallet_id,
            path = %path.display(),
            "Vault record written"
        );
        Ok(())
    }

    async fn remove(&self, wallet_id: &str) -> VaultResult<bool> {
        let path = self.record_path(wallet_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(unavailable("remove", &path, e)),
        }
    }

    async fn list(&self) -> VaultResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unavailable("list", &self.dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| unavailable("list", &self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_wallet_id(stem).is_ok() {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Process-local storage for tests and ephemeral wallets.
#[derive(Debug, Default)]
pub struct MemoryKeyStorage {
    records: DashMap<String, EncryptedKeyRecord>,
}

impl MemoryKeyStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStorage for MemoryKeyStorage {
    async fn load(&self, wallet_id: &str) -> VaultResult<Option<EncryptedKeyRecord>> {
        validate_wallet_id(wallet_id)?;
        Ok(self.records.get(wallet_id).map(|r| r.clone()))
    }

    async fn save(&self, record: &EncryptedKeyRecord) -> VaultResult<()> {
        validate_wallet_id(&record.wallet_id)?;
        self.records.insert(record.wallet_id.clone(), record.clone());
        Ok(())
    }

    async fn remove(&self, wallet_id: &str) -> VaultResult<bool> {
        validate_wallet_id(wallet_id)?;
        Ok(self.records.remove(wallet_id).is_some())
    }

    async fn list(&self) -> VaultResult<Vec<String>> {
        let mut ids: Vec<String> = self.records.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::record::{CIPHER_TEXT_LEN, IV_LEN, RECORD_VERSION, SALT_LEN};

    fn record(wallet_id: &str) -> EncryptedKeyRecord {
        EncryptedKeyRecord {
            version: RECORD_VERSION,
            wallet_id: wallet_id.to_string(),
            cipher_text: vec![7; CIPHER_TEXT_LEN],
            iv: vec![1; IV_LEN],
            salt: vec![2; SALT_LEN],
            kdf_iterations: 1,
            kdf_memory_kib: 8,
            kdf_parallelism: 1,
        }
    }

    #[tokio::test]
    async fn test_file_storage_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::new(dir.path().join("vault"));

        assert!(storage.list().await.unwrap().is_empty());
        assert_eq!(storage.load("main").await.unwrap(), None);

        storage.save(&record("main")).await.unwrap();
        storage.save(&record("alt")).await.unwrap();
        assert_eq!(storage.load("main").await.unwrap(), Some(record("main")));
        assert_eq!(storage.list().await.unwrap(), vec!["alt", "main"]);

        assert!(storage.remove("main").await.unwrap());
        assert!(!storage.remove("main").await.unwrap());
        assert_eq!(storage.list().await.unwrap(), vec!["alt"]);
    }

    #[tokio::test]
    async fn test_file_storage_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::new(dir.path());
        storage.save(&record("main")).await.unwrap();
        storage.save(&record("main")).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["main.json"]);
    }

    #[tokio::test]
    async fn test_file_storage_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::new(dir.path());
        assert!(matches!(
            storage.load("../secret").await,
            Err(VaultError::InvalidWalletId(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupted_file_reads_as_auth_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.json"), b"garbage").unwrap();
        let storage = FileKeyStorage::new(dir.path());
        assert_eq!(storage.load("main").await, Err(VaultError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryKeyStorage::new();
        storage.save(&record("b")).await.unwrap();
        storage.save(&record("a")).await.unwrap();
        assert_eq!(storage.list().await.unwrap(), vec!["a", "b"]);
        assert!(storage.remove("a").await.unwrap());
        assert_eq!(storage.load("a").await.unwrap(), None);
    }
}
