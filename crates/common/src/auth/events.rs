//! Structured flow events
//!
//! The controller reports every state resolution and exchange outcome through
//! a [`FlowObserver`]. Events never carry token values.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::types::TokenStateKind;

/// One observable step of `get_access_token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// Stored record loaded and classified
    StateResolved {
        /// Classification of the stored record
        state: TokenStateKind,
    },
    /// Valid cached token returned without network traffic
    CachedTokenReturned,
    /// Caller attached to an exchange already in flight
    JoinedInFlight,
    /// Refresh exchange started
    RefreshStarted,
    /// Refresh exchange returned a record
    RefreshSucceeded {
        /// Whether the response carried a new refresh token
        rotated: bool,
    },
    /// Refresh exchange failed; the error is surfaced to the caller
    RefreshFailed {
        /// Rendered error, never a token value
        reason: String,
    },
    /// Interactive authorization handed to the presenter
    AuthorizationStarted,
    /// Presenter returned a redirect with a matching state
    AuthorizationCallbackReceived,
    /// Interactive authorization ended before the code exchange
    AuthorizationAborted {
        /// Cancellation, presenter failure or state mismatch
        reason: String,
    },
    /// Authorization-code exchange started
    ExchangeStarted,
    /// Authorization-code exchange returned a record
    ExchangeSucceeded,
    /// Authorization-code exchange failed
    ExchangeFailed {
        /// Rendered error, never a token value
        reason: String,
    },
    /// New record written to the store
    TokensPersisted {
        /// Whether the persisted record can be refreshed
        has_refresh_token: bool,
        /// Expiry of the persisted record
        expires_at: Option<DateTime<Utc>>,
    },
}

/// Receiver of [`FlowEvent`]s.
pub trait FlowObserver: Send + Sync {
    /// Called synchronously for each event.
    fn on_event(&self, event: &FlowEvent);
}

/// Default observer: forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl FlowObserver for TracingObserver {
    fn on_event(&self, event: &FlowEvent) {
        match event {
            FlowEvent::StateResolved { state } => debug!(%state, "resolved token state"),
            FlowEvent::CachedTokenReturned => debug!("returning cached access token"),
            FlowEvent::JoinedInFlight => debug!("joining in-flight token exchange"),
            FlowEvent::RefreshStarted => info!("refreshing expired access token"),
            FlowEvent::RefreshSucceeded { rotated } => {
                info!(rotated, "access token refreshed");
            }
            FlowEvent::RefreshFailed { reason } => warn!(%reason, "token refresh failed"),
            FlowEvent::AuthorizationStarted => info!("starting interactive authorization"),
            FlowEvent::AuthorizationCallbackReceived => debug!("authorization callback received"),
            FlowEvent::AuthorizationAborted { reason } => {
                warn!(%reason, "interactive authorization aborted");
            }
            FlowEvent::ExchangeStarted => debug!("exchanging authorization code"),
            FlowEvent::ExchangeSucceeded => info!("authorization code exchanged"),
            FlowEvent::ExchangeFailed { reason } => warn!(%reason, "code exchange failed"),
            FlowEvent::TokensPersisted { has_refresh_token, expires_at } => {
                info!(has_refresh_token, expires_at = ?expires_at, "persisted token record");
            }
        }
    }
}
