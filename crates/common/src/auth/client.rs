//! HTTP token client for the Threads token endpoints
//!
//! Performs the two form-encoded POST exchanges of the PKCE flow:
//! - Authorization code + verifier for a token record
//! - Refresh token for a new token record
//!
//! Each call issues exactly one request and never retries. The controller
//! decides what a failure means.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::config::ProviderConfig;
use super::pkce::{AuthorizationRequest, CODE_CHALLENGE_METHOD};
use super::traits::TokenEndpoint;
use super::types::{TokenRecord, TokenResponse};
use crate::time::{Clock, SystemClock};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for token endpoint calls
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenClientError {
    /// Authorization-code exchange returned a non-2xx status
    #[error("token exchange failed with HTTP {status}: {body}")]
    Exchange {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Refresh exchange returned a non-2xx status
    #[error("token refresh failed with HTTP {status}: {body}")]
    Refresh {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// 2xx response without a usable token record
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    /// The request never produced a response
    #[error("token endpoint request failed: {0}")]
    Transport(String),
}

impl TokenClientError {
    /// HTTP status of a rejected exchange, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Exchange { status, .. } | Self::Refresh { status, .. } => Some(*status),
            Self::MalformedResponse(_) | Self::Transport(_) => None,
        }
    }
}

impl From<reqwest::Error> for TokenClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exchange {
    AuthorizationCode,
    Refresh,
}

impl Exchange {
    fn rejected(self, status: StatusCode, body: String) -> TokenClientError {
        let status = status.as_u16();
        match self {
            Self::AuthorizationCode => TokenClientError::Exchange { status, body },
            Self::Refresh => TokenClientError::Refresh { status, body },
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Refresh => "refresh_token",
        }
    }
}

/// reqwest-backed [`TokenEndpoint`]
///
/// `expires_at` is derived from the response's `expires_in` and the
/// client's clock at the moment the response arrives.
#[derive(Clone)]
pub struct HttpTokenClient {
    config: Arc<ProviderConfig>,
    http: Client,
    clock: Arc<dyn Clock>,
}

impl HttpTokenClient {
    /// Create a client with a 30 second request timeout.
    #[must_use]
    pub fn new(config: Arc<ProviderConfig>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { config, http, clock: Arc::new(SystemClock) }
    }

    /// Use a preconfigured reqwest client.
    #[must_use]
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Use `clock` to stamp issued records.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configuration the client posts with.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Exchange an authorization code for a token record.
    ///
    /// # Errors
    /// [`TokenClientError::Exchange`] on non-2xx, `MalformedResponse` if the
    /// body carries no access token, `Transport` if no response arrived.
    pub async fn exchange_code(
        &self,
        request: &AuthorizationRequest,
        code: &str,
    ) -> Result<TokenRecord, TokenClientError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("code_verifier", request.code_verifier()),
            ("grant_type", "authorization_code"),
            ("code_challenge_method", CODE_CHALLENGE_METHOD),
            ("redirect_uri", request.redirect_uri()),
        ];

        self.post_form(&self.config.endpoints.token_url, &params, Exchange::AuthorizationCode)
            .await
    }

    /// Exchange a refresh token for a new token record.
    ///
    /// A response without `refresh_token` yields a record without one.
    ///
    /// # Errors
    /// [`TokenClientError::Refresh`] on non-2xx, `MalformedResponse` if the
    /// body carries no access token, `Transport` if no response arrived.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, TokenClientError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        self.post_form(&self.config.endpoints.refresh_url, &params, Exchange::Refresh).await
    }

    async fn post_form(
        &self,
        url: &Url,
        params: &[(&str, &str)],
        exchange: Exchange,
    ) -> Result<TokenRecord, TokenClientError> {
        debug!(grant = exchange.name(), endpoint = %url, "posting token request");

        let response = self.http.post(url.clone()).form(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(grant = exchange.name(), status = status.as_u16(), "token endpoint rejected request");
            return Err(exchange.rejected(status, body));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| TokenClientError::MalformedResponse(format!("invalid JSON body: {e}")))?;

        let record = parsed.into_record(self.clock.now()).ok_or_else(|| {
            TokenClientError::MalformedResponse("response is missing access_token".to_string())
        })?;

        debug!(
            grant = exchange.name(),
            has_refresh_token = record.refresh_token.is_some(),
            expires_at = ?record.expires_at,
            "token request succeeded"
        );
        Ok(record)
    }
}

impl std::fmt::Debug for HttpTokenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTokenClient").field("config", &self.config).finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenClient {
    async fn exchange_code(
        &self,
        request: &AuthorizationRequest,
        code: &str,
    ) -> Result<TokenRecord, TokenClientError> {
        self.exchange_code(request, code).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, TokenClientError> {
        self.refresh(refresh_token).await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::client.
    use chrono::{DateTime, TimeDelta, Utc};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::config::ProviderEndpoints;
    use crate::time::MockClock;

    fn issued_at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap()
    }

    fn client_for(server: &MockServer) -> HttpTokenClient {
        let base = server.uri();
        let endpoints = ProviderEndpoints::new(
            &format!("{base}/oauth/authorize"),
            &format!("{base}/oauth/access_token"),
            &format!("{base}/refresh_access_token"),
            "https://example.com/redirect",
        )
        .unwrap();
        let config =
            ProviderConfig::new("client123", "app-secret", vec!["threads_basic".into()], endpoints);
        HttpTokenClient::new(Arc::new(config)).with_clock(Arc::new(MockClock::at(issued_at())))
    }

    /// Validates the code exchange posts every PKCE field and stamps expiry
    /// from the client clock.
    ///
    /// Assertions:
    /// - Form body carries client credentials, code, verifier and redirect.
    /// - `expires_at` equals clock time plus `expires_in`.
    #[tokio::test]
    async fn test_exchange_code_success() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let request = AuthorizationRequest::generate("https://example.com/redirect");

        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("client_id=client123"))
            .and(body_string_contains("client_secret=app-secret"))
            .and(body_string_contains("code=auth-code"))
            .and(body_string_contains(format!("code_verifier={}", request.code_verifier())))
            .and(body_string_contains("code_challenge_method=S256"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok1",
                "refresh_token": "ref1",
                "expires_in": 3600,
                "user_id": "42"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let record = client.exchange_code(&request, "auth-code").await.unwrap();

        assert_eq!(record.access_token, "tok1");
        assert_eq!(record.refresh_token.as_deref(), Some("ref1"));
        assert_eq!(record.expires_at, Some(issued_at() + TimeDelta::seconds(3600)));
    }

    #[tokio::test]
    async fn test_exchange_code_rejected_carries_status_and_body() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let request = AuthorizationRequest::generate("https://example.com/redirect");

        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let err = client.exchange_code(&request, "stale-code").await.unwrap_err();

        assert_eq!(
            err,
            TokenClientError::Exchange {
                status: 400,
                body: r#"{"error":"invalid_grant"}"#.to_string()
            }
        );
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn test_refresh_without_rotation_drops_refresh_token() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        Mock::given(method("POST"))
            .and(path("/refresh_access_token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=ref1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "tok2", "expires_in": 5_184_000})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let record = client.refresh("ref1").await.unwrap();

        assert_eq!(record.access_token, "tok2");
        assert!(record.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        Mock::given(method("POST"))
            .and(path("/refresh_access_token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("revoked"))
            .mount(&server)
            .await;

        let err = client.refresh("ref1").await.unwrap_err();

        assert_eq!(err, TokenClientError::Refresh { status: 401, body: "revoked".to_string() });
    }

    #[tokio::test]
    async fn test_success_without_access_token_is_malformed() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        Mock::given(method("POST"))
            .and(path("/refresh_access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"expires_in": 60})))
            .mount(&server)
            .await;

        let err = client.refresh("ref1").await.unwrap_err();

        assert!(matches!(err, TokenClientError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_success_with_non_json_body_is_malformed() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        Mock::given(method("POST"))
            .and(path("/refresh_access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client.refresh("ref1").await.unwrap_err();

        assert!(matches!(err, TokenClientError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        drop(server);

        let err = client.refresh("ref1").await.unwrap_err();

        assert!(matches!(err, TokenClientError::Transport(_)));
        assert_eq!(err.status(), None);
    }
}
