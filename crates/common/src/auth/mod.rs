//! OAuth 2.0 + PKCE token lifecycle for the Threads API
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │ PkceFlowController │  get_access_token(): cached / refresh / interactive
//! └─────────┬──────────┘
//!           │
//!           ├──► TokenStore              (durable TokenRecord, injected)
//!           ├──► TokenEndpoint           (HttpTokenClient: code + refresh POSTs)
//!           ├──► AuthorizationPresenter  (host browser-redirect capability)
//!           ├──► Clock                   (expiry decisions)
//!           └──► FlowObserver            (structured FlowEvents, tracing by default)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use threads_auth_common::auth::{
//!     AuthorizationCallback, AuthorizationPresenter, AuthorizationPrompt, EndpointSet,
//!     MemoryTokenStore, PkceFlowController, PresenterError, ProviderConfig,
//! };
//!
//! struct Browser;
//!
//! #[async_trait::async_trait]
//! impl AuthorizationPresenter for Browser {
//!     async fn present_authorization(
//!         &self,
//!         prompt: &AuthorizationPrompt,
//!     ) -> Result<AuthorizationCallback, PresenterError> {
//!         // Open `prompt.url`, wait for the redirect, then parse it.
//!         AuthorizationCallback::from_redirect_url(&prompt.url)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProviderConfig::threads("client_id", "app_secret", EndpointSet::Direct)?;
//!     let controller =
//!         PkceFlowController::new(config, Arc::new(MemoryTokenStore::new()), Arc::new(Browser));
//!
//!     let token = controller.get_access_token().await?;
//!     println!("Authorization: {}", token.bearer_header());
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: `TokenRecord`, `AccessToken`, token state classification
//! - **[`config`]**: provider configuration and built-in endpoint presets
//! - **[`pkce`]**: verifier/challenge/state generation, authorization request
//! - **[`client`]**: HTTP token client
//! - **[`store`]**: store errors and the in-process store
//! - **[`events`]**: flow events and observers
//! - **[`controller`]**: the state machine

pub mod client;
pub mod config;
pub mod controller;
pub mod events;
pub mod pkce;
pub mod store;
pub mod traits;
pub mod types;

pub use client::{HttpTokenClient, TokenClientError};
pub use config::{EndpointSet, ProviderConfig, ProviderEndpoints, THREADS_SCOPES};
pub use controller::{AuthorizationError, PkceFlowController};
pub use events::{FlowEvent, FlowObserver, TracingObserver};
pub use pkce::{
    generate_code_challenge, generate_code_verifier, generate_state, validate_state,
    AuthorizationCallback, AuthorizationPrompt, AuthorizationRequest,
};
pub use store::{validate_record, MemoryTokenStore, StoreError};
pub use traits::{AuthorizationPresenter, PresenterError, TokenEndpoint, TokenStore};
pub use types::{is_expired, AccessToken, TokenRecord, TokenResponse, TokenState, TokenStateKind};
