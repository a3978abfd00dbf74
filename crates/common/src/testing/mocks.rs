//! Mock implementations of the flow controller's collaborators
//!
//! Provides in-memory doubles for the token endpoint, the host presenter and
//! the flow observer. Each double records what it was asked to do.

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::{
    AuthorizationCallback, AuthorizationPresenter, AuthorizationPrompt, AuthorizationRequest,
    FlowEvent, FlowObserver, PresenterError, TokenClientError, TokenEndpoint, TokenRecord,
};

type ExchangeResult = Result<TokenRecord, TokenClientError>;

fn not_configured() -> ExchangeResult {
    Err(TokenClientError::Transport("mock endpoint not configured".to_string()))
}

/// Mock token endpoint with canned results
///
/// # Examples
///
/// ```
/// use threads_auth_common::testing::mocks::MockTokenEndpoint;
/// use threads_auth_common::TokenRecord;
///
/// let endpoint = MockTokenEndpoint::new()
///     .with_refresh_result(Ok(TokenRecord::new("tok2", None, None)));
/// assert_eq!(endpoint.refresh_calls(), 0);
/// ```
#[derive(Debug)]
pub struct MockTokenEndpoint {
    exchange_result: Mutex<ExchangeResult>,
    refresh_result: Mutex<ExchangeResult>,
    delay: Option<Duration>,
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    last_code: Mutex<Option<String>>,
    last_verifier: Mutex<Option<String>>,
    last_refresh_token: Mutex<Option<String>>,
}

impl Default for MockTokenEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTokenEndpoint {
    /// Create an endpoint whose calls fail until configured
    pub fn new() -> Self {
        Self {
            exchange_result: Mutex::new(not_configured()),
            refresh_result: Mutex::new(not_configured()),
            delay: None,
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            last_code: Mutex::new(None),
            last_verifier: Mutex::new(None),
            last_refresh_token: Mutex::new(None),
        }
    }

    /// Result returned by every code exchange
    #[must_use]
    pub fn with_exchange_result(self, result: ExchangeResult) -> Self {
        // SAFETY: Mutex poisoning is acceptable in test mocks
        *self.exchange_result.lock().unwrap() = result;
        self
    }

    /// Result returned by every refresh
    #[must_use]
    pub fn with_refresh_result(self, result: ExchangeResult) -> Self {
        // SAFETY: Mutex poisoning is acceptable in test mocks
        *self.refresh_result.lock().unwrap() = result;
        self
    }

    /// Sleep before answering, to keep an exchange in flight
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of code exchanges performed
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    /// Number of refreshes performed
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Authorization code of the last exchange
    pub fn last_code(&self) -> Option<String> {
        self.last_code.lock().unwrap().clone()
    }

    /// Code verifier of the last exchange
    pub fn last_verifier(&self) -> Option<String> {
        self.last_verifier.lock().unwrap().clone()
    }

    /// Refresh token of the last refresh
    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn exchange_code(
        &self,
        request: &AuthorizationRequest,
        code: &str,
    ) -> Result<TokenRecord, TokenClientError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_code.lock().unwrap() = Some(code.to_string());
        *self.last_verifier.lock().unwrap() = Some(request.code_verifier().to_string());
        self.pause().await;
        self.exchange_result.lock().unwrap().clone()
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, TokenClientError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_token.lock().unwrap() = Some(refresh_token.to_string());
        self.pause().await;
        self.refresh_result.lock().unwrap().clone()
    }
}

#[derive(Debug, Clone)]
enum PresenterBehavior {
    Approve { code: String },
    ApproveWithState { code: String, state: String },
    Fail(PresenterError),
}

/// Mock host presenter
///
/// An approving presenter echoes the prompt's `state`, the way a real
/// provider redirect would.
#[derive(Debug)]
pub struct MockPresenter {
    behavior: PresenterBehavior,
    calls: AtomicUsize,
    prompts: Mutex<Vec<AuthorizationPrompt>>,
}

impl MockPresenter {
    fn with_behavior(behavior: PresenterBehavior) -> Self {
        Self { behavior, calls: AtomicUsize::new(0), prompts: Mutex::new(Vec::new()) }
    }

    /// User approves; the redirect carries `code`
    pub fn approving(code: impl Into<String>) -> Self {
        Self::with_behavior(PresenterBehavior::Approve { code: code.into() })
    }

    /// Redirect carries `code` but a foreign `state`
    pub fn with_foreign_state(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self::with_behavior(PresenterBehavior::ApproveWithState {
            code: code.into(),
            state: state.into(),
        })
    }

    /// User aborts or denies consent
    pub fn cancelling() -> Self {
        Self::with_behavior(PresenterBehavior::Fail(PresenterError::Cancelled))
    }

    /// Host capability fails
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_behavior(PresenterBehavior::Fail(PresenterError::Failed(reason.into())))
    }

    /// Number of prompts presented
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most recent prompt
    pub fn last_prompt(&self) -> Option<AuthorizationPrompt> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AuthorizationPresenter for MockPresenter {
    async fn present_authorization(
        &self,
        prompt: &AuthorizationPrompt,
    ) -> Result<AuthorizationCallback, PresenterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());

        match &self.behavior {
            PresenterBehavior::Approve { code } => {
                Ok(AuthorizationCallback::new(code.clone(), prompt.state.clone()))
            }
            PresenterBehavior::ApproveWithState { code, state } => {
                Ok(AuthorizationCallback::new(code.clone(), state.clone()))
            }
            PresenterBehavior::Fail(err) => Err(err.clone()),
        }
    }
}

/// Observer that keeps every event
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<FlowEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, in order
    pub fn events(&self) -> Vec<FlowEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Whether `event` was received
    pub fn contains(&self, event: &FlowEvent) -> bool {
        self.events.lock().unwrap().contains(event)
    }
}

impl FlowObserver for RecordingObserver {
    fn on_event(&self, event: &FlowEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
