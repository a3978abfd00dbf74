//! Platform keychain token store
//!
//! Stores the whole record as one JSON secret under a (service, account)
//! entry: macOS Keychain, Windows Credential Manager or the Linux Secret
//! Service, through `keyring`.

use async_trait::async_trait;
use keyring::Entry;
use threads_auth_common::auth::{validate_record, StoreError, TokenRecord, TokenStore};
use tracing::debug;

/// Default keychain service name.
pub const DEFAULT_SERVICE: &str = "threads-auth";

/// Default keychain account name.
pub const DEFAULT_ACCOUNT: &str = "default";

/// Token store backed by the platform keychain
#[derive(Debug, Clone)]
pub struct KeychainTokenStore {
    service: String,
    account: String,
}

impl Default for KeychainTokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE, DEFAULT_ACCOUNT)
    }
}

impl KeychainTokenStore {
    /// Create a store for one keychain entry.
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self { service: service.into(), account: account.into() }
    }

    /// Delete the stored record (idempotent).
    ///
    /// # Errors
    /// Returns `StoreError::Backend` if the keychain refuses the deletion.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let (service, account) = (self.service.clone(), self.account.clone());
        run_blocking(move || {
            let entry = Entry::new(&service, &account).map_err(map_keyring_error)?;
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(map_keyring_error(e)),
            }
        })
        .await
    }
}

#[async_trait]
impl TokenStore for KeychainTokenStore {
    async fn load(&self) -> Result<Option<TokenRecord>, StoreError> {
        debug!(service = %self.service, account = %self.account, "loading token record from keychain");

        let (service, account) = (self.service.clone(), self.account.clone());
        let secret = run_blocking(move || {
            let entry = Entry::new(&service, &account).map_err(map_keyring_error)?;
            match entry.get_password() {
                Ok(secret) => Ok(Some(secret)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(map_keyring_error(e)),
            }
        })
        .await?;

        secret.as_deref().map(decode_record).transpose()
    }

    async fn save(&self, record: &TokenRecord) -> Result<(), StoreError> {
        validate_record(record)?;
        let payload = serde_json::to_string(record).map_err(|e| StoreError::Io(e.to_string()))?;

        let (service, account) = (self.service.clone(), self.account.clone());
        run_blocking(move || {
            let entry = Entry::new(&service, &account).map_err(map_keyring_error)?;
            entry.set_password(&payload).map_err(map_keyring_error)
        })
        .await?;

        debug!(service = %self.service, account = %self.account, "token record stored in keychain");
        Ok(())
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|e| StoreError::Io(e.to_string()))?
}

fn decode_record(secret: &str) -> Result<TokenRecord, StoreError> {
    let record: TokenRecord =
        serde_json::from_str(secret).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    validate_record(&record).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok(record)
}

fn map_keyring_error(err: keyring::Error) -> StoreError {
    match err {
        keyring::Error::BadEncoding(_) => {
            StoreError::Corrupt("keychain entry is not valid UTF-8".to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}
