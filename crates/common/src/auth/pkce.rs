//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636: a locally generated `code_verifier` is kept secret
//! until the code exchange, while its S256 hash travels in the authorization
//! request.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use url::Url;

use super::config::ProviderConfig;
use super::traits::PresenterError;

/// The only challenge method this client uses.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

const RANDOM_BYTES: usize = 32;

fn random_urlsafe() -> String {
    let mut bytes = [0_u8; RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a cryptographically secure code verifier
///
/// 32 random bytes, base64url-encoded without padding (43 characters, within
/// the RFC 7636 43-128 limit).
#[must_use]
pub fn generate_code_verifier() -> String {
    random_urlsafe()
}

/// Derive the code challenge: `BASE64URL(SHA256(ASCII(code_verifier)))`.
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random state token for CSRF protection.
#[must_use]
pub fn generate_state() -> String {
    random_urlsafe()
}

/// Compare the expected and received state in constant time.
#[must_use]
pub fn validate_state(expected: &str, actual: &str) -> bool {
    let (expected, actual) = (expected.as_bytes(), actual.as_bytes());
    if expected.len() != actual.len() {
        return false;
    }
    expected.iter().zip(actual).fold(0_u8, |diff, (a, b)| diff | (a ^ b)) == 0
}

/// One interactive authorization attempt
///
/// Owned exclusively by the flow controller for the duration of a single
/// attempt and dropped afterwards, whatever the outcome. The verifier is
/// never part of the prompt handed to the host.
#[derive(Clone)]
pub struct AuthorizationRequest {
    code_verifier: String,
    code_challenge: String,
    redirect_uri: String,
    state: String,
}

impl AuthorizationRequest {
    /// Generate a fresh verifier, challenge and state for `redirect_uri`.
    #[must_use]
    pub fn generate(redirect_uri: impl Into<String>) -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        Self { code_verifier, code_challenge, redirect_uri: redirect_uri.into(), state: generate_state() }
    }

    /// Secret verifier, sent only with the code exchange.
    #[must_use]
    pub fn code_verifier(&self) -> &str {
        &self.code_verifier
    }

    /// S256 challenge derived from the verifier.
    #[must_use]
    pub fn code_challenge(&self) -> &str {
        &self.code_challenge
    }

    /// Redirect URI the provider will call back.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// CSRF state expected back on the redirect.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Build the browser authorization URL for this request.
    #[must_use]
    pub fn authorization_url(&self, config: &ProviderConfig) -> Url {
        let mut url = config.endpoints.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &config.scope_string())
            .append_pair("response_type", "code")
            .append_pair("code_challenge", &self.code_challenge)
            .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD)
            .append_pair("state", &self.state);
        url
    }

    /// Read-only view handed to the host's presenter.
    #[must_use]
    pub fn prompt(&self, config: &ProviderConfig) -> AuthorizationPrompt {
        AuthorizationPrompt {
            url: self.authorization_url(config),
            redirect_uri: self.redirect_uri.clone(),
            state: self.state.clone(),
        }
    }
}

impl fmt::Debug for AuthorizationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationRequest")
            .field("code_verifier", &"<redacted>")
            .field("code_challenge", &self.code_challenge)
            .field("redirect_uri", &self.redirect_uri)
            .field("state", &self.state)
            .finish()
    }
}

/// What the host needs to show the authorization page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationPrompt {
    /// Fully built authorize URL
    pub url: Url,
    /// Redirect URI the provider will navigate to
    pub redirect_uri: String,
    /// State the redirect must echo back
    pub state: String,
}

/// Provider redirect carrying the authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCallback {
    /// One-time authorization code
    pub code: String,
    /// State echoed by the provider
    pub state: String,
}

impl AuthorizationCallback {
    /// Create a callback from its parts.
    #[must_use]
    pub fn new(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self { code: code.into(), state: state.into() }
    }

    /// Parse a provider redirect URL.
    ///
    /// `error=access_denied` maps to [`PresenterError::Cancelled`]; any other
    /// `error`, or a redirect missing `code`/`state`, maps to
    /// [`PresenterError::Failed`]. Threads appends a `#_` fragment to the
    /// redirect, which is ignored.
    ///
    /// # Errors
    /// See above.
    pub fn from_redirect_url(url: &Url) -> Result<Self, PresenterError> {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            if error == "access_denied" {
                return Err(PresenterError::Cancelled);
            }
            return Err(PresenterError::Failed(match description {
                Some(description) => format!("{error}: {description}"),
                None => error,
            }));
        }

        match (code.filter(|c| !c.is_empty()), state) {
            (Some(code), Some(state)) => Ok(Self { code, state }),
            (None, _) => Err(PresenterError::Failed("redirect is missing `code`".to_string())),
            (Some(_), None) => {
                Err(PresenterError::Failed("redirect is missing `state`".to_string()))
            }
        }
    }
}
