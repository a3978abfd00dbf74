//! OAuth 2.0 types and structures
//!
//! Defines the persisted [`TokenRecord`], the wire-level [`TokenResponse`],
//! the caller-facing [`AccessToken`] and the per-invocation [`TokenState`]
//! used by the flow controller.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// The persisted unit of authorization state.
///
/// A record either exists with a non-empty `access_token` or does not exist
/// at all. Records are overwritten wholesale by every exchange, never merged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Opaque bearer credential for the resource API
    pub access_token: String,

    /// Present only if the provider issued one. Absence means expiry forces a
    /// full re-authorization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Absolute expiration timestamp (UTC). Absence means the record is never
    /// proactively considered expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// Create a record from its parts.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self { access_token: access_token.into(), refresh_token, expires_at }
    }

    /// Whether the record satisfies the persistence invariant (non-empty
    /// access token).
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Seconds until expiry relative to `now`; negative once expired, `None`
    /// when no expiry is known.
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - now).num_seconds())
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Whether `record` is expired at `now`.
///
/// A record is expired only when `expires_at` is present and strictly in the
/// past. Records without an expiry are always treated as fresh.
#[must_use]
pub fn is_expired(record: &TokenRecord, now: DateTime<Utc>) -> bool {
    record.expires_at.is_some_and(|expires_at| expires_at < now)
}

/// Token endpoint response body shared by the code and refresh exchanges.
///
/// Every field is optional at the serde level so that a missing
/// `access_token` surfaces as a malformed response rather than a generic
/// deserialization failure. Unknown fields (Threads adds `user_id`) are
/// ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    /// Bearer credential
    #[serde(default)]
    pub access_token: Option<String>,
    /// Rotated refresh token, if issued
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds; integer or float on the wire
    #[serde(default)]
    pub expires_in: Option<f64>,
    /// Token type reported by the provider (`bearer`)
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Convert into a [`TokenRecord`] issued at `issued_at`.
    ///
    /// Returns `None` when the response lacks a usable access token. An
    /// `expires_in` under one second yields a record without expiry, and an empty
    /// `refresh_token` is treated as absent.
    #[must_use]
    pub fn into_record(self, issued_at: DateTime<Utc>) -> Option<TokenRecord> {
        let access_token = self.access_token.filter(|token| !token.is_empty())?;
        let refresh_token = self.refresh_token.filter(|token| !token.is_empty());
        let expires_at = self
            .expires_in
            .and_then(whole_seconds)
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime));

        Some(TokenRecord { access_token, refresh_token, expires_at })
    }
}

/// Truncate a wire lifetime to whole seconds; sub-second and non-finite
/// values carry no expiry.
#[allow(clippy::cast_possible_truncation)]
fn whole_seconds(lifetime: f64) -> Option<i64> {
    let seconds = lifetime.trunc();
    (seconds.is_finite() && seconds >= 1.0).then_some(seconds as i64)
}

/// Bearer credential handed to callers.
///
/// `Debug` never prints the token value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the raw token value.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Value for an HTTP `Authorization` header.
    #[must_use]
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

impl From<TokenRecord> for AccessToken {
    fn from(record: TokenRecord) -> Self {
        Self(record.access_token)
    }
}

impl PartialEq<str> for AccessToken {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for AccessToken {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Discriminant of [`TokenState`], used in flow events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStateKind {
    /// Store is empty
    NoToken,
    /// Record present and not expired
    Valid,
    /// Record expired, refresh token available
    ExpiredWithRefresh,
    /// Record expired, no refresh token
    ExpiredNoRefresh,
}

impl fmt::Display for TokenStateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoToken => "no_token",
            Self::Valid => "valid",
            Self::ExpiredWithRefresh => "expired_with_refresh",
            Self::ExpiredNoRefresh => "expired_no_refresh",
        };
        f.write_str(name)
    }
}

/// Token state at the start of one `get_access_token` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    /// Nothing stored; a full interactive flow is required
    NoToken,
    /// The stored record can be returned as-is
    Valid(TokenRecord),
    /// The stored record expired but can be refreshed
    ExpiredWithRefresh {
        /// Refresh token taken from the expired record
        refresh_token: String,
    },
    /// The stored record expired and cannot be refreshed
    ExpiredNoRefresh,
}

impl TokenState {
    /// Classify the stored record at `now`.
    #[must_use]
    pub fn classify(record: Option<TokenRecord>, now: DateTime<Utc>) -> Self {
        match record {
            None => Self::NoToken,
            Some(record) if !is_expired(&record, now) => Self::Valid(record),
            Some(record) => match record.refresh_token.filter(|token| !token.is_empty()) {
                Some(refresh_token) => Self::ExpiredWithRefresh { refresh_token },
                None => Self::ExpiredNoRefresh,
            },
        }
    }

    /// Discriminant without the payload.
    #[must_use]
    pub fn kind(&self) -> TokenStateKind {
        match self {
            Self::NoToken => TokenStateKind::NoToken,
            Self::Valid(_) => TokenStateKind::Valid,
            Self::ExpiredWithRefresh { .. } => TokenStateKind::ExpiredWithRefresh,
            Self::ExpiredNoRefresh => TokenStateKind::ExpiredNoRefresh,
        }
    }
}
