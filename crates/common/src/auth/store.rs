//! Token store errors and the in-process store
//!
//! Durable stores live in the infra crate; [`MemoryTokenStore`] keeps the
//! record for the lifetime of the process and backs tests and embedders that
//! manage persistence themselves.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use super::traits::TokenStore;
use super::types::TokenRecord;

/// Error type for token store operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Reading or writing the backing storage failed
    #[error("token storage I/O failed: {0}")]
    Io(String),

    /// The platform credential store reported an error
    #[error("credential backend error: {0}")]
    Backend(String),

    /// Stored data could not be decoded or violates the record invariant
    #[error("stored token record is corrupt: {0}")]
    Corrupt(String),

    /// Refused to persist a record that violates the invariant
    #[error("refusing to persist malformed token record: {0}")]
    InvalidRecord(String),
}

/// Reject records that must never be persisted.
///
/// # Errors
/// Returns [`StoreError::InvalidRecord`] if the access token is empty.
pub fn validate_record(record: &TokenRecord) -> Result<(), StoreError> {
    if record.is_well_formed() {
        Ok(())
    } else {
        Err(StoreError::InvalidRecord("access_token is empty".to_string()))
    }
}

/// In-process token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    record: RwLock<Option<TokenRecord>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `record`.
    #[must_use]
    pub fn with_record(record: TokenRecord) -> Self {
        Self { record: RwLock::new(Some(record)) }
    }

    /// Current record, if any.
    pub async fn snapshot(&self) -> Option<TokenRecord> {
        self.record.read().await.clone()
    }

    /// Drop the stored record.
    pub async fn clear(&self) {
        *self.record.write().await = None;
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.record.read().await.clone())
    }

    async fn save(&self, record: &TokenRecord) -> Result<(), StoreError> {
        validate_record(record)?;
        *self.record.write().await = Some(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::store.
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let store = MemoryTokenStore::new();
        let record = TokenRecord::new("tok1", Some("ref1".to_string()), Some(Utc::now()));

        store.save(&record).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_save_overwrites_without_merging() {
        let store =
            MemoryTokenStore::with_record(TokenRecord::new("tok1", Some("ref1".to_string()), None));

        store.save(&TokenRecord::new("tok2", None, None)).await.unwrap();

        let current = store.snapshot().await.unwrap();
        assert_eq!(current.access_token, "tok2");
        assert!(current.refresh_token.is_none());
    }

    /// Malformed records are rejected and the previous record survives.
    #[tokio::test]
    async fn test_malformed_record_is_rejected() {
        let original = TokenRecord::new("tok1", None, None);
        let store = MemoryTokenStore::with_record(original.clone());

        let result = store.save(&TokenRecord::new("", Some("ref".to_string()), None)).await;

        assert!(matches!(result, Err(StoreError::InvalidRecord(_))));
        assert_eq!(store.snapshot().await, Some(original));
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemoryTokenStore::with_record(TokenRecord::new("tok1", None, None));
        store.clear().await;
        assert_eq!(store.load().await.unwrap(), None);
    }
}
