//! PKCE flow controller and token lifecycle state machine
//!
//! [`PkceFlowController::get_access_token`] is the only operation callers
//! use. Each invocation loads the stored record, classifies it against the
//! injected clock and then either returns the cached token, refreshes it, or
//! runs the interactive authorization handshake. Token-producing work runs as
//! a single shared flight so concurrent callers never trigger a second
//! exchange.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::Mutex;

use super::client::{HttpTokenClient, TokenClientError};
use super::config::ProviderConfig;
use super::events::{FlowEvent, FlowObserver, TracingObserver};
use super::pkce::{validate_state, AuthorizationRequest};
use super::store::StoreError;
use super::traits::{AuthorizationPresenter, PresenterError, TokenEndpoint, TokenStore};
use super::types::{AccessToken, TokenRecord, TokenState, TokenStateKind};
use crate::time::{Clock, SystemClock};

/// Error returned by [`PkceFlowController::get_access_token`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    /// User aborted the interactive flow or denied consent
    #[error("interactive authorization was cancelled")]
    InteractiveFlowCancelled,

    /// The host presenter could not complete the redirect round-trip
    #[error("interactive authorization failed: {0}")]
    InteractiveFlowFailed(String),

    /// The redirect carried a state this controller did not issue
    #[error("authorization state mismatch (possible CSRF)")]
    StateMismatch {
        /// State sent with the authorization request
        expected: String,
        /// State received on the redirect
        received: String,
    },

    /// Provider rejected the authorization-code exchange
    #[error("token exchange rejected with HTTP {status}: {body}")]
    TokenExchange {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Provider rejected the refresh
    #[error("token refresh rejected with HTTP {status}: {body}")]
    Refresh {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// 2xx response without a usable token
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    /// Network failure talking to the token endpoint
    #[error("transport failure: {0}")]
    Transport(String),

    /// Token store failed to load or save
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthorizationError {
    /// Whether retrying the same call may succeed without user action.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Store(StoreError::Io(_) | StoreError::Backend(_))
        )
    }

    /// Whether the stored credential is unusable and the user has to go
    /// through the interactive flow again.
    #[must_use]
    pub const fn requires_reauthorization(&self) -> bool {
        match self {
            Self::Refresh { status, .. } => *status >= 400 && *status < 500,
            Self::InteractiveFlowCancelled | Self::StateMismatch { .. } => true,
            _ => false,
        }
    }
}

impl From<TokenClientError> for AuthorizationError {
    fn from(err: TokenClientError) -> Self {
        match err {
            TokenClientError::Exchange { status, body } => Self::TokenExchange { status, body },
            TokenClientError::Refresh { status, body } => Self::Refresh { status, body },
            TokenClientError::MalformedResponse(reason) => Self::MalformedResponse(reason),
            TokenClientError::Transport(reason) => Self::Transport(reason),
        }
    }
}

impl From<PresenterError> for AuthorizationError {
    fn from(err: PresenterError) -> Self {
        match err {
            PresenterError::Cancelled => Self::InteractiveFlowCancelled,
            PresenterError::Failed(reason) => Self::InteractiveFlowFailed(reason),
        }
    }
}

type TokenResult = Result<AccessToken, AuthorizationError>;
type Flight = Shared<BoxFuture<'static, TokenResult>>;

/// Owns the token lifecycle for one credential
///
/// Generic over its collaborators so hosts and tests can inject the store,
/// the interactive presenter and the token endpoint. The clock and the flow
/// observer default to [`SystemClock`] and [`TracingObserver`].
pub struct PkceFlowController<S, P, E = HttpTokenClient> {
    config: Arc<ProviderConfig>,
    store: Arc<S>,
    presenter: Arc<P>,
    endpoint: Arc<E>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn FlowObserver>,
    in_flight: Mutex<Option<(u64, Flight)>>,
    next_flight_id: AtomicU64,
}

impl<S, P> PkceFlowController<S, P, HttpTokenClient>
where
    S: TokenStore + 'static,
    P: AuthorizationPresenter + 'static,
{
    /// Create a controller talking to the configured endpoints over HTTP.
    #[must_use]
    pub fn new(config: ProviderConfig, store: Arc<S>, presenter: Arc<P>) -> Self {
        let config = Arc::new(config);
        let endpoint = Arc::new(HttpTokenClient::new(Arc::clone(&config)));
        Self::assemble(config, store, presenter, endpoint)
    }
}

impl<S, P, E> PkceFlowController<S, P, E>
where
    S: TokenStore + 'static,
    P: AuthorizationPresenter + 'static,
    E: TokenEndpoint + 'static,
{
    /// Create a controller with an explicit token endpoint.
    #[must_use]
    pub fn with_endpoint(
        config: ProviderConfig,
        store: Arc<S>,
        presenter: Arc<P>,
        endpoint: Arc<E>,
    ) -> Self {
        Self::assemble(Arc::new(config), store, presenter, endpoint)
    }

    fn assemble(
        config: Arc<ProviderConfig>,
        store: Arc<S>,
        presenter: Arc<P>,
        endpoint: Arc<E>,
    ) -> Self {
        Self {
            config,
            store,
            presenter,
            endpoint,
            clock: Arc::new(SystemClock),
            observer: Arc::new(TracingObserver),
            in_flight: Mutex::new(None),
            next_flight_id: AtomicU64::new(0),
        }
    }

    /// Use `clock` for expiry decisions.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Send flow events to `observer` instead of `tracing`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn FlowObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Provider configuration in use.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Return a valid access token, refreshing or authorizing as needed.
    ///
    /// The record produced by an exchange is persisted before the token is
    /// returned. A failed refresh is surfaced as-is; it never falls back to
    /// the interactive flow and never touches the stored record.
    ///
    /// Callers arriving while an exchange is in flight join it and receive
    /// the same outcome.
    ///
    /// # Errors
    /// See [`AuthorizationError`].
    pub async fn get_access_token(&self) -> Result<AccessToken, AuthorizationError> {
        let (flight_id, flight) = {
            let mut slot = self.in_flight.lock().await;

            // A completed flight left behind by a dropped caller is stale.
            let pending = slot
                .as_ref()
                .filter(|(_, flight)| flight.peek().is_none())
                .map(|(id, flight)| (*id, flight.clone()));

            if let Some(joined) = pending {
                self.observer.on_event(&FlowEvent::JoinedInFlight);
                joined
            } else {
                let work = match self.resolve_state().await? {
                    TokenState::Valid(record) => {
                        *slot = None;
                        self.observer.on_event(&FlowEvent::CachedTokenReturned);
                        return Ok(record.into());
                    }
                    TokenState::ExpiredWithRefresh { refresh_token } => {
                        self.flow().refresh(refresh_token).boxed()
                    }
                    TokenState::NoToken | TokenState::ExpiredNoRefresh => {
                        self.flow().authorize_interactively().boxed()
                    }
                };

                let id = self.next_flight_id.fetch_add(1, Ordering::Relaxed);
                let flight = work.shared();
                *slot = Some((id, flight.clone()));
                (id, flight)
            }
        };

        let result = flight.await;

        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|(id, _)| *id == flight_id) {
            *slot = None;
        }
        result
    }

    /// Alias for [`get_access_token`](Self::get_access_token).
    ///
    /// # Errors
    /// See [`AuthorizationError`].
    pub async fn authorize(&self) -> Result<AccessToken, AuthorizationError> {
        self.get_access_token().await
    }

    /// Classify the stored record without starting any exchange.
    ///
    /// # Errors
    /// Returns [`AuthorizationError::Store`] if the store cannot be read.
    pub async fn token_state(&self) -> Result<TokenStateKind, AuthorizationError> {
        let record = self.store.load().await?;
        Ok(TokenState::classify(record, self.clock.now()).kind())
    }

    async fn resolve_state(&self) -> Result<TokenState, AuthorizationError> {
        let record = self.store.load().await?;
        let state = TokenState::classify(record, self.clock.now());
        self.observer.on_event(&FlowEvent::StateResolved { state: state.kind() });
        Ok(state)
    }

    fn flow(&self) -> Flow<S, P, E> {
        Flow {
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
            presenter: Arc::clone(&self.presenter),
            endpoint: Arc::clone(&self.endpoint),
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<S, P, E> fmt::Debug for PkceFlowController<S, P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceFlowController")
            .field("config", &self.config)
            .field("next_flight_id", &self.next_flight_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Owned handles for one token-producing flight.
struct Flow<S, P, E> {
    config: Arc<ProviderConfig>,
    store: Arc<S>,
    presenter: Arc<P>,
    endpoint: Arc<E>,
    observer: Arc<dyn FlowObserver>,
}

impl<S, P, E> Flow<S, P, E>
where
    S: TokenStore,
    P: AuthorizationPresenter,
    E: TokenEndpoint,
{
    fn emit(&self, event: FlowEvent) {
        self.observer.on_event(&event);
    }

    async fn refresh(self, refresh_token: String) -> TokenResult {
        self.emit(FlowEvent::RefreshStarted);

        let record = match self.endpoint.refresh(&refresh_token).await {
            Ok(record) => record,
            Err(err) => {
                self.emit(FlowEvent::RefreshFailed { reason: err.to_string() });
                return Err(err.into());
            }
        };

        self.emit(FlowEvent::RefreshSucceeded { rotated: record.refresh_token.is_some() });
        self.persist(record).await
    }

    async fn authorize_interactively(self) -> TokenResult {
        let request = AuthorizationRequest::generate(self.config.endpoints.redirect_uri.clone());
        let prompt = request.prompt(&self.config);
        self.emit(FlowEvent::AuthorizationStarted);

        let callback = match self.presenter.present_authorization(&prompt).await {
            Ok(callback) => callback,
            Err(err) => {
                self.emit(FlowEvent::AuthorizationAborted { reason: err.to_string() });
                return Err(err.into());
            }
        };

        if !validate_state(request.state(), &callback.state) {
            let err = AuthorizationError::StateMismatch {
                expected: request.state().to_string(),
                received: callback.state,
            };
            self.emit(FlowEvent::AuthorizationAborted { reason: err.to_string() });
            return Err(err);
        }
        self.emit(FlowEvent::AuthorizationCallbackReceived);

        self.emit(FlowEvent::ExchangeStarted);
        let record = match self.endpoint.exchange_code(&request, &callback.code).await {
            Ok(record) => record,
            Err(err) => {
                self.emit(FlowEvent::ExchangeFailed { reason: err.to_string() });
                return Err(err.into());
            }
        };
        self.emit(FlowEvent::ExchangeSucceeded);

        self.persist(record).await
    }

    async fn persist(&self, record: TokenRecord) -> TokenResult {
        self.store.save(&record).await?;
        self.emit(FlowEvent::TokensPersisted {
            has_refresh_token: record.refresh_token.is_some(),
            expires_at: record.expires_at,
        });
        Ok(record.into())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::controller.
    use std::time::Duration;

    use chrono::{DateTime, TimeDelta, Utc};

    use super::*;
    use crate::auth::config::EndpointSet;
    use crate::auth::pkce::generate_code_challenge;
    use crate::auth::store::MemoryTokenStore;
    use crate::testing::{MockPresenter, MockTokenEndpoint, RecordingObserver};
    use crate::time::MockClock;

    type TestController = PkceFlowController<MemoryTokenStore, MockPresenter, MockTokenEndpoint>;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap()
    }

    fn config() -> ProviderConfig {
        ProviderConfig::threads("client123", "secret", EndpointSet::Direct).unwrap()
    }

    fn expired(refresh: Option<&str>) -> TokenRecord {
        TokenRecord::new("tok1", refresh.map(ToString::to_string), Some(now() - TimeDelta::hours(1)))
    }

    fn issued(access: &str, refresh: Option<&str>) -> TokenRecord {
        TokenRecord::new(access, refresh.map(ToString::to_string), Some(now() + TimeDelta::hours(1)))
    }

    struct Harness {
        controller: TestController,
        store: Arc<MemoryTokenStore>,
        presenter: Arc<MockPresenter>,
        endpoint: Arc<MockTokenEndpoint>,
        observer: Arc<RecordingObserver>,
    }

    fn harness(
        store: MemoryTokenStore,
        presenter: MockPresenter,
        endpoint: MockTokenEndpoint,
    ) -> Harness {
        let store = Arc::new(store);
        let presenter = Arc::new(presenter);
        let endpoint = Arc::new(endpoint);
        let observer = Arc::new(RecordingObserver::new());
        let controller = PkceFlowController::with_endpoint(
            config(),
            Arc::clone(&store),
            Arc::clone(&presenter),
            Arc::clone(&endpoint),
        )
        .with_clock(Arc::new(MockClock::at(now())))
        .with_observer(Arc::clone(&observer) as Arc<dyn FlowObserver>);

        Harness { controller, store, presenter, endpoint, observer }
    }

    /// Validates a fresh record is returned without any exchange.
    ///
    /// Assertions:
    /// - Token equals the stored access token.
    /// - Neither the endpoint nor the presenter is called.
    #[tokio::test]
    async fn test_valid_token_is_returned_from_cache() {
        let h = harness(
            MemoryTokenStore::with_record(issued("tok1", Some("ref1"))),
            MockPresenter::approving("abc123"),
            MockTokenEndpoint::new(),
        );

        let token = h.controller.get_access_token().await.unwrap();

        assert_eq!(token, "tok1");
        assert_eq!(h.endpoint.refresh_calls() + h.endpoint.exchange_calls(), 0);
        assert_eq!(h.presenter.calls(), 0);
        assert!(h.observer.contains(&FlowEvent::CachedTokenReturned));
    }

    #[tokio::test]
    async fn test_record_without_expiry_never_refreshes() {
        let h = harness(
            MemoryTokenStore::with_record(TokenRecord::new("tok1", Some("ref1".into()), None)),
            MockPresenter::approving("abc123"),
            MockTokenEndpoint::new(),
        );

        assert_eq!(h.controller.get_access_token().await.unwrap(), "tok1");
        assert_eq!(h.endpoint.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_store_runs_interactive_flow() {
        let h = harness(
            MemoryTokenStore::new(),
            MockPresenter::approving("abc123"),
            MockTokenEndpoint::new().with_exchange_result(Ok(issued("tok1", Some("ref1")))),
        );

        let token = h.controller.get_access_token().await.unwrap();

        assert_eq!(token, "tok1");
        assert_eq!(h.store.snapshot().await, Some(issued("tok1", Some("ref1"))));
        assert_eq!(h.endpoint.last_code().as_deref(), Some("abc123"));

        let prompt = h.presenter.last_prompt().unwrap();
        let challenge = prompt
            .url
            .query_pairs()
            .find(|(key, _)| key == "code_challenge")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        assert_eq!(generate_code_challenge(&h.endpoint.last_verifier().unwrap()), challenge);
    }

    #[tokio::test]
    async fn test_expired_without_refresh_runs_interactive_flow() {
        let h = harness(
            MemoryTokenStore::with_record(expired(None)),
            MockPresenter::approving("abc123"),
            MockTokenEndpoint::new().with_exchange_result(Ok(issued("tok2", None))),
        );

        assert_eq!(h.controller.authorize().await.unwrap(), "tok2");
        assert_eq!(h.presenter.calls(), 1);
        assert_eq!(h.endpoint.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_persists_record_as_returned() {
        let h = harness(
            MemoryTokenStore::with_record(expired(Some("ref1"))),
            MockPresenter::approving("abc123"),
            MockTokenEndpoint::new().with_refresh_result(Ok(issued("tok2", None))),
        );

        let token = h.controller.get_access_token().await.unwrap();

        assert_eq!(token, "tok2");
        assert_eq!(h.endpoint.last_refresh_token().as_deref(), Some("ref1"));
        let stored = h.store.snapshot().await.unwrap();
        assert_eq!(stored.access_token, "tok2");
        assert!(stored.refresh_token.is_none());
        assert!(h.observer.contains(&FlowEvent::RefreshSucceeded { rotated: false }));
    }

    /// Validates a rejected refresh is surfaced without side effects.
    ///
    /// Assertions:
    /// - Error is `Refresh` with the provider status.
    /// - Stored record is unchanged.
    /// - No interactive flow is started.
    #[tokio::test]
    async fn test_refresh_failure_is_surfaced() {
        let h = harness(
            MemoryTokenStore::with_record(expired(Some("ref1"))),
            MockPresenter::approving("abc123"),
            MockTokenEndpoint::new().with_refresh_result(Err(TokenClientError::Refresh {
                status: 400,
                body: "invalid refresh token".into(),
            })),
        );

        let err = h.controller.get_access_token().await.unwrap_err();

        assert_eq!(
            err,
            AuthorizationError::Refresh { status: 400, body: "invalid refresh token".into() }
        );
        assert!(err.requires_reauthorization());
        assert_eq!(h.store.snapshot().await, Some(expired(Some("ref1"))));
        assert_eq!(h.presenter.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_flow_writes_nothing() {
        let h = harness(
            MemoryTokenStore::new(),
            MockPresenter::cancelling(),
            MockTokenEndpoint::new().with_exchange_result(Ok(issued("tok1", None))),
        );

        let err = h.controller.get_access_token().await.unwrap_err();

        assert_eq!(err, AuthorizationError::InteractiveFlowCancelled);
        assert_eq!(h.endpoint.exchange_calls(), 0);
        assert_eq!(h.store.snapshot().await, None);
    }

    #[tokio::test]
    async fn test_presenter_failure_is_reported() {
        let h = harness(
            MemoryTokenStore::new(),
            MockPresenter::failing("browser unavailable"),
            MockTokenEndpoint::new(),
        );

        let err = h.controller.get_access_token().await.unwrap_err();

        assert_eq!(err, AuthorizationError::InteractiveFlowFailed("browser unavailable".into()));
    }

    #[tokio::test]
    async fn test_foreign_state_is_rejected_before_exchange() {
        let h = harness(
            MemoryTokenStore::new(),
            MockPresenter::with_foreign_state("abc123", "forged"),
            MockTokenEndpoint::new().with_exchange_result(Ok(issued("tok1", None))),
        );

        let err = h.controller.get_access_token().await.unwrap_err();

        assert!(matches!(err, AuthorizationError::StateMismatch { ref received, .. } if received == "forged"));
        assert_eq!(h.endpoint.exchange_calls(), 0);
        assert_eq!(h.store.snapshot().await, None);
    }

    #[tokio::test]
    async fn test_exchange_failure_keeps_prior_record() {
        let h = harness(
            MemoryTokenStore::with_record(expired(None)),
            MockPresenter::approving("abc123"),
            MockTokenEndpoint::new()
                .with_exchange_result(Err(TokenClientError::Transport("timed out".into()))),
        );

        let err = h.controller.get_access_token().await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(h.store.snapshot().await, Some(expired(None)));
    }

    /// Validates concurrent callers share one refresh.
    ///
    /// Assertions:
    /// - Every caller receives the refreshed token.
    /// - The endpoint sees exactly one refresh call.
    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let h = harness(
            MemoryTokenStore::with_record(expired(Some("ref1"))),
            MockPresenter::approving("abc123"),
            MockTokenEndpoint::new()
                .with_refresh_result(Ok(issued("tok2", Some("ref2"))))
                .with_delay(Duration::from_millis(50)),
        );

        let (a, b, c) = tokio::join!(
            h.controller.get_access_token(),
            h.controller.get_access_token(),
            h.controller.get_access_token()
        );

        assert_eq!(a.unwrap(), "tok2");
        assert_eq!(b.unwrap(), "tok2");
        assert_eq!(c.unwrap(), "tok2");
        assert_eq!(h.endpoint.refresh_calls(), 1);
        assert!(h.observer.contains(&FlowEvent::JoinedInFlight));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failure() {
        let h = harness(
            MemoryTokenStore::with_record(expired(Some("ref1"))),
            MockPresenter::approving("abc123"),
            MockTokenEndpoint::new()
                .with_refresh_result(Err(TokenClientError::Refresh {
                    status: 401,
                    body: "revoked".into(),
                }))
                .with_delay(Duration::from_millis(50)),
        );

        let (a, b) = tokio::join!(h.controller.get_access_token(), h.controller.get_access_token());

        assert_eq!(a.unwrap_err(), b.unwrap_err());
        assert_eq!(h.endpoint.refresh_calls(), 1);
    }

    /// A finished flight is not reused: the next call starts from the store.
    #[tokio::test]
    async fn test_failed_flight_is_not_cached() {
        let h = harness(
            MemoryTokenStore::with_record(expired(Some("ref1"))),
            MockPresenter::approving("abc123"),
            MockTokenEndpoint::new()
                .with_refresh_result(Err(TokenClientError::Transport("offline".into()))),
        );

        assert!(h.controller.get_access_token().await.is_err());
        assert!(h.controller.get_access_token().await.is_err());

        assert_eq!(h.endpoint.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn test_token_state_reports_classification() {
        let h = harness(
            MemoryTokenStore::with_record(expired(Some("ref1"))),
            MockPresenter::approving("abc123"),
            MockTokenEndpoint::new(),
        );

        assert_eq!(h.controller.token_state().await.unwrap(), TokenStateKind::ExpiredWithRefresh);
        assert_eq!(h.endpoint.refresh_calls(), 0);
    }

    #[test]
    fn test_error_classification() {
        assert!(AuthorizationError::Transport("reset".into()).is_retryable());
        assert!(AuthorizationError::Store(StoreError::Io("disk".into())).is_retryable());
        assert!(!AuthorizationError::Store(StoreError::Corrupt("bad".into())).is_retryable());
        assert!(!AuthorizationError::Refresh { status: 503, body: String::new() }
            .requires_reauthorization());
        assert!(AuthorizationError::InteractiveFlowCancelled.requires_reauthorization());
        assert!(!AuthorizationError::MalformedResponse("x".into()).requires_reauthorization());
    }
}
