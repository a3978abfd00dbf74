//! JSON file token store
//!
//! The record is written to a temporary file in the target directory and
//! renamed over the previous one, so readers see either the old or the new
//! record and never a partial write. The temporary file is created with
//! owner-only permissions on Unix.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use threads_auth_common::auth::{validate_record, StoreError, TokenRecord, TokenStore};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const DEFAULT_DIR: &str = ".threads-auth";
const DEFAULT_FILE: &str = "tokens.json";

/// Token store backed by a single JSON file
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    /// Store the record at `path`. Parent directories are created on first
    /// save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    /// `$HOME/.threads-auth/tokens.json`, or `./.threads-auth/tokens.json`
    /// when no home directory is set.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let base = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map_or_else(|| PathBuf::from("."), PathBuf::from);
        base.join(DEFAULT_DIR).join(DEFAULT_FILE)
    }

    /// File the record is stored in.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the stored record. Missing files are not an error.
    ///
    /// # Errors
    /// Returns `StoreError::Io` if the file exists but cannot be removed.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<TokenRecord>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored token record");
                return Ok(None);
            }
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };

        let record: TokenRecord = serde_json::from_str(&contents).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "stored token record is not valid JSON");
            StoreError::Corrupt(e.to_string())
        })?;

        validate_record(&record).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Some(record))
    }

    async fn save(&self, record: &TokenRecord) -> Result<(), StoreError> {
        validate_record(record)?;
        let bytes = serde_json::to_vec_pretty(record).map_err(|e| StoreError::Io(e.to_string()))?;

        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| StoreError::Io(e.to_string()))??;

        debug!(path = %self.path.display(), "token record saved");
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| StoreError::Io(e.to_string()))?;

    let mut temp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::Io(e.to_string()))?;
    temp.write_all(bytes).map_err(|e| StoreError::Io(e.to_string()))?;
    temp.as_file().sync_all().map_err(|e| StoreError::Io(e.to_string()))?;
    temp.persist(path).map_err(|e| StoreError::Io(e.error.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, Utc};
    use tempfile::TempDir;

    use super::*;

    fn record(access: &str, refresh: Option<&str>) -> TokenRecord {
        let expires_at = DateTime::<Utc>::from_timestamp(1_735_689_600, 0)
            .map(|t| t + TimeDelta::milliseconds(1500));
        TokenRecord::new(access, refresh.map(ToString::to_string), expires_at)
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));

        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load_is_identical() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested/tokens.json"));
        let original = record("tok1", Some("ref1"));

        store.save(&original).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn test_save_replaces_previous_record() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));

        store.save(&record("tok1", Some("ref1"))).await.unwrap();
        store.save(&record("tok2", None)).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "tok2");
        assert!(loaded.refresh_token.is_none());

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "temporary files must not be left behind");
    }

    #[tokio::test]
    async fn test_malformed_record_is_rejected_on_save() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));
        store.save(&record("tok1", None)).await.unwrap();

        let result = store.save(&record("", Some("ref1"))).await;

        assert!(matches!(result, Err(StoreError::InvalidRecord(_))));
        assert_eq!(store.load().await.unwrap(), Some(record("tok1", None)));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        let store = FileTokenStore::new(&path);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(store.load().await, Err(StoreError::Corrupt(_))));

        std::fs::write(&path, r#"{"access_token":""}"#).unwrap();
        assert!(matches!(store.load().await, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));
        store.save(&record("tok1", None)).await.unwrap();

        store.clear().await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.load().await.unwrap(), None);
    }

    #[test]
    fn test_default_path_ends_with_tokens_file() {
        let path = FileTokenStore::default_path();
        assert!(path.ends_with(".threads-auth/tokens.json"));
    }
}
