//! Traits for the flow controller's collaborators
//!
//! These traits enable dependency injection and testing by abstracting the
//! external dependencies of the PKCE flow: durable token storage, the token
//! endpoints, and the host's interactive browser-redirect capability.

use async_trait::async_trait;
use thiserror::Error;

use super::client::TokenClientError;
use super::pkce::{AuthorizationCallback, AuthorizationPrompt, AuthorizationRequest};
use super::store::StoreError;
use super::types::TokenRecord;

/// Durable holder of the current token record
///
/// Both operations must be atomic with respect to concurrent callers: a
/// `load` never observes a half-written record.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the current record, or `None` if nothing has been authorized yet.
    ///
    /// # Errors
    /// Returns error if the backing storage cannot be read or holds a record
    /// that violates the non-empty access token invariant.
    async fn load(&self) -> Result<Option<TokenRecord>, StoreError>;

    /// Replace the current record.
    ///
    /// # Errors
    /// Returns error if the record is malformed or cannot be written.
    async fn save(&self, record: &TokenRecord) -> Result<(), StoreError>;
}

/// Trait for the two token-endpoint exchanges
///
/// Implementations perform a single network call per invocation and never
/// retry on their own.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code, proving possession of the request's
    /// code verifier.
    ///
    /// # Errors
    /// Returns error if the provider rejects the exchange, the response is
    /// malformed, or the transport fails.
    async fn exchange_code(
        &self,
        request: &AuthorizationRequest,
        code: &str,
    ) -> Result<TokenRecord, TokenClientError>;

    /// Obtain a new record using a refresh token.
    ///
    /// # Errors
    /// Returns error if the provider rejects the refresh, the response is
    /// malformed, or the transport fails.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, TokenClientError>;
}

/// Failure reported by an [`AuthorizationPresenter`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PresenterError {
    /// The user aborted the flow or denied consent
    #[error("authorization cancelled by the user")]
    Cancelled,

    /// The host could not complete the redirect round-trip
    #[error("authorization presentation failed: {0}")]
    Failed(String),
}

/// Host-provided interactive browser-redirect capability
///
/// Shows the authorization page to the user and resolves with the redirect
/// callback. Waiting is bounded only by user action.
#[async_trait]
pub trait AuthorizationPresenter: Send + Sync {
    /// Present the authorization prompt and wait for the provider redirect.
    ///
    /// # Errors
    /// Returns [`PresenterError::Cancelled`] if the user aborts or denies
    /// consent, [`PresenterError::Failed`] for any other failure.
    async fn present_authorization(
        &self,
        prompt: &AuthorizationPrompt,
    ) -> Result<AuthorizationCallback, PresenterError>;
}
