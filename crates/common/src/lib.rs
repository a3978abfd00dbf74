//! OAuth 2.0 PKCE authorization and access-token lifecycle for the Threads
//! API.
//!
//! The crate is organised around a single entry point,
//! [`auth::PkceFlowController::get_access_token`], which hands a valid access
//! token to the caller. Depending on the persisted token state it returns the
//! cached token, refreshes it, or drives a full interactive PKCE handshake.
//!
//! # Modules
//!
//! - [`auth`]: token model, PKCE primitives, HTTP token client, controller
//! - [`time`]: injectable clock used for expiry decisions
//! - `testing` (feature `test-utils`): in-memory doubles for every seam

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod auth;
pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use auth::{
    AccessToken, AuthorizationError, AuthorizationPresenter, HttpTokenClient, PkceFlowController,
    ProviderConfig, TokenRecord, TokenStore,
};
pub use time::{Clock, MockClock, SystemClock};
