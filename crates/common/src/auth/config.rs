//! Provider configuration bundle
//!
//! An immutable description of the OAuth client registration and the four
//! endpoints the flow talks to. The direct-vs-proxied URL set is chosen once,
//! when the bundle is built, and never re-evaluated per call.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Scopes requested from Threads by default.
pub const THREADS_SCOPES: [&str; 2] = ["threads_basic", "threads_content_publish"];

const THREADS_AUTHORIZE_URL: &str = "https://threads.net/oauth/authorize";
const THREADS_TOKEN_URL: &str = "https://graph.threads.net/oauth/access_token";
const THREADS_REFRESH_URL: &str = "https://graph.threads.net/refresh_access_token";
const THREADS_REDIRECT_URI: &str = "https://www.raycast.com/redirect?packageName=Threads";

const PROXY_AUTHORIZE_URL: &str = "https://oauth.raycast.com/v1/authorize/nfHB6cDPqbgj8N64YEN8-UWKH8lggowN6W87hSwqKFSL7P9PnIpnbQ2RJCCC1U8IijxCyp88VqMVFbQVeLS2l4J0v84kz4ZeSbN75ONnPJGYHft3Rr9kh7nc9KtvC2lV0g";
const PROXY_TOKEN_URL: &str = "https://oauth.raycast.com/v1/token/sprtng8yLEVTuyWdSdMWwgl_FopeRQlQgaDX3ayMGPiUi_8fOJrnPWBpUptgFjJ-B8Wvgia-f4CSZaU0XTfBhLNAYEhnKNM2oAoX4j8sOCWoWcMONkcc_FGIPJiIHMaqayNKMPXWZQ9rrQ";
const PROXY_REFRESH_URL: &str = "https://oauth.raycast.com/v1/refresh-token/npCE9XXNZu7rsRiPNbsAzu3Xlv5_F05E4npZWFN-w2kReNQbbvzu-Wme-TDegwPtESGjQ-aSQMx0IuefOHrO4vITK-uqpQXvfgv_1urSV_lIi6mbqTY1ngL6C5ryw_GvO7drj5KU_huqftkO";
const PROXY_REDIRECT_URI: &str = "https://oauth.raycast.com/redirect";

/// Which of the two interchangeable URL sets to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointSet {
    /// Talk to the provider directly
    #[default]
    Direct,
    /// Route through the trusted OAuth proxy
    Proxied,
}

/// The four URLs the PKCE flow needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    /// Browser authorization page
    pub authorize_url: Url,
    /// Authorization-code exchange endpoint
    pub token_url: Url,
    /// Refresh exchange endpoint
    pub refresh_url: Url,
    /// Redirect URI registered with the provider (sent verbatim)
    pub redirect_uri: String,
}

impl ProviderEndpoints {
    /// Build an endpoint set from raw strings.
    ///
    /// # Errors
    /// Returns an error if any of the three endpoint URLs fails to parse.
    pub fn new(
        authorize_url: &str,
        token_url: &str,
        refresh_url: &str,
        redirect_uri: impl Into<String>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            authorize_url: Url::parse(authorize_url)?,
            token_url: Url::parse(token_url)?,
            refresh_url: Url::parse(refresh_url)?,
            redirect_uri: redirect_uri.into(),
        })
    }

    /// Built-in Threads endpoints for the chosen URL set.
    ///
    /// # Errors
    /// Only fails if a built-in constant is not a valid URL.
    pub fn threads(set: EndpointSet) -> Result<Self, url::ParseError> {
        match set {
            EndpointSet::Direct => Self::new(
                THREADS_AUTHORIZE_URL,
                THREADS_TOKEN_URL,
                THREADS_REFRESH_URL,
                THREADS_REDIRECT_URI,
            ),
            EndpointSet::Proxied => Self::new(
                PROXY_AUTHORIZE_URL,
                PROXY_TOKEN_URL,
                PROXY_REFRESH_URL,
                PROXY_REDIRECT_URI,
            ),
        }
    }
}

/// OAuth client registration plus endpoints.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// OAuth client ID
    pub client_id: String,

    /// Client secret sent with the authorization-code exchange
    pub client_secret: String,

    /// Ordered scope list
    pub scopes: Vec<String>,

    /// Separator used when joining `scopes` into the `scope` parameter.
    /// RFC 6749 uses a space; Threads expects a comma.
    pub scope_delimiter: char,

    /// Endpoint URLs
    pub endpoints: ProviderEndpoints,
}

impl ProviderConfig {
    /// Create a configuration with the RFC 6749 space scope delimiter.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scopes: Vec<String>,
        endpoints: ProviderEndpoints,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes,
            scope_delimiter: ' ',
            endpoints,
        }
    }

    /// Threads configuration with the default scopes and comma delimiter.
    ///
    /// # Errors
    /// Only fails if a built-in endpoint constant is not a valid URL.
    pub fn threads(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        set: EndpointSet,
    ) -> Result<Self, url::ParseError> {
        let scopes = THREADS_SCOPES.iter().map(ToString::to_string).collect();
        Ok(Self::new(client_id, client_secret, scopes, ProviderEndpoints::threads(set)?)
            .with_scope_delimiter(','))
    }

    /// Override the scope delimiter.
    #[must_use]
    pub fn with_scope_delimiter(mut self, delimiter: char) -> Self {
        self.scope_delimiter = delimiter;
        self
    }

    /// Override the scope list.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Scopes joined with the configured delimiter.
    #[must_use]
    pub fn scope_string(&self) -> String {
        let mut delimiter = [0_u8; 4];
        self.scopes.join(self.scope_delimiter.encode_utf8(&mut delimiter))
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("scope_delimiter", &self.scope_delimiter)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::config.
    use super::*;

    #[test]
    fn test_threads_direct_preset() {
        let config = ProviderConfig::threads("client123", "secret", EndpointSet::Direct).unwrap();

        assert_eq!(config.endpoints.authorize_url.as_str(), THREADS_AUTHORIZE_URL);
        assert_eq!(config.endpoints.token_url.as_str(), THREADS_TOKEN_URL);
        assert_eq!(config.endpoints.refresh_url.as_str(), THREADS_REFRESH_URL);
        assert_eq!(config.endpoints.redirect_uri, THREADS_REDIRECT_URI);
        assert_eq!(config.scope_string(), "threads_basic,threads_content_publish");
    }

    #[test]
    fn test_threads_proxied_preset() {
        let config = ProviderConfig::threads("client123", "secret", EndpointSet::Proxied).unwrap();

        assert_eq!(config.endpoints.authorize_url.host_str(), Some("oauth.raycast.com"));
        assert_eq!(config.endpoints.redirect_uri, PROXY_REDIRECT_URI);
    }

    #[test]
    fn test_scope_string_uses_configured_delimiter() {
        let endpoints = ProviderEndpoints::threads(EndpointSet::Direct).unwrap();
        let config = ProviderConfig::new(
            "client",
            "secret",
            vec!["openid".to_string(), "profile".to_string()],
            endpoints,
        );

        assert_eq!(config.scope_string(), "openid profile");
        assert_eq!(config.with_scope_delimiter(',').scope_string(), "openid,profile");
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let result = ProviderEndpoints::new("not a url", THREADS_TOKEN_URL, THREADS_REFRESH_URL, "x");
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_client_secret() {
        let config = ProviderConfig::threads("client", "super-secret", EndpointSet::Direct).unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
