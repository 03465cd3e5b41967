//! Credential sets and the shared handle clients mutate.

use crate::refresh::TokenResponse;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One authenticated identity for one external service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    /// Bearer token for API calls.
    pub access_token: String,
    /// Token used to obtain a new access token. `None` makes expiry terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token goes stale. `None` disables pre-emptive refresh.
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    /// Application client id.
    #[serde(default)]
    pub client_id: String,
    /// Application client secret.
    #[serde(default)]
    pub client_secret: String,
}

impl CredentialSet {
    /// Create a credential set holding only an access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            client_id: String::new(),
            client_secret: String::new(),
        }
    }

    /// Set the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    /// Set the absolute expiry.
    #[must_use]
    pub fn with_expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Set the expiry relative to now.
    ///
    /// A lifetime too large to represent leaves the set without an expiry; an
    /// unrepresentable negative one marks it expired.
    #[must_use]
    pub fn expires_in(mut self, secs: i64) -> Self {
        self.expires_at =
            expiry_after(secs).or_else(|| (secs < 0).then_some(DateTime::<Utc>::MIN_UTC));
        self
    }

    /// Set the application client id and secret.
    #[must_use]
    pub fn with_client(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.client_id = id.into();
        self.client_secret = secret.into();
        self
    }

    /// Whether the access token is known to be stale.
    ///
    /// A token with no expiry is never considered expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the access token is stale at the given instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    /// Whether this set can be renewed without re-authorization.
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Build the credential set that results from a successful refresh.
    ///
    /// The refresh token is kept when the service does not rotate it, and the
    /// expiry is cleared when the service reports no lifetime or one too large
    /// to represent.
    pub fn apply_refresh(&self, tokens: TokenResponse) -> Self {
        let expires_at = tokens
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(expiry_after);

        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token.or_else(|| self.refresh_token.clone()),
            expires_at,
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }

    /// Load a credential set from environment variables with given prefix.
    ///
    /// Looks for:
    /// - `{PREFIX}_ACCESS_TOKEN` (required)
    /// - `{PREFIX}_REFRESH_TOKEN`
    /// - `{PREFIX}_EXPIRES_AT` (seconds since epoch)
    /// - `{PREFIX}_CLIENT_ID`
    /// - `{PREFIX}_CLIENT_SECRET`
    pub fn from_env(prefix: &str) -> Option<Self> {
        let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).ok();

        Some(Self {
            access_token: var("ACCESS_TOKEN")?,
            refresh_token: var("REFRESH_TOKEN"),
            expires_at: var("EXPIRES_AT")
                .and_then(|s| s.parse::<i64>().ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            client_id: var("CLIENT_ID").unwrap_or_default(),
            client_secret: var("CLIENT_SECRET").unwrap_or_default(),
        })
    }
}

/// `now + secs`, or `None` when that instant is out of range.
fn expiry_after(secs: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(secs).and_then(|d| Utc::now().checked_add_signed(d))
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Shared, lock-protected handle to a [`CredentialSet`].
///
/// Updates only ever replace the whole set under a single write lock, so a
/// reader sees either the old set or the new one.
#[derive(Clone, Default)]
pub struct SharedCredentials {
    inner: Arc<RwLock<CredentialSet>>,
}

impl SharedCredentials {
    /// Wrap a credential set.
    pub fn new(credentials: CredentialSet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(credentials)),
        }
    }

    /// Copy out the current credential set.
    pub fn snapshot(&self) -> CredentialSet {
        self.inner.read().clone()
    }

    /// Current access token.
    pub fn access_token(&self) -> String {
        self.inner.read().access_token.clone()
    }

    /// Atomically replace the credential set.
    pub fn replace(&self, credentials: CredentialSet) {
        *self.inner.write() = credentials;
    }
}

impl Default for CredentialSet {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl fmt::Debug for SharedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedCredentials")
            .field(&*self.inner.read())
            .finish()
    }
}

impl From<CredentialSet> for SharedCredentials {
    fn from(credentials: CredentialSet) -> Self {
        Self::new(credentials)
    }
}
