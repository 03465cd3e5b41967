//! Per-authorization state (CSRF state, optional PKCE pair).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// How long an authorization may stay pending.
const CONTEXT_LIFETIME_SECS: i64 = 300;

/// Runtime state for one in-progress authorization.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    /// Random state parameter for CSRF protection
    pub state: String,
    /// PKCE code verifier, when PKCE is used
    pub code_verifier: Option<String>,
    /// PKCE code challenge (SHA256 of the verifier)
    pub code_challenge: Option<String>,
    /// When this context was created
    pub created_at: DateTime<Utc>,
    /// Redirect URI registered for this authorization
    pub redirect_uri: Option<String>,
}

impl AuthorizationContext {
    /// Create a context with a fresh state and, if requested, a PKCE pair.
    pub fn new(use_pkce: bool) -> Result<Self, getrandom::Error> {
        let state = random_hex(32)?;
        let (code_verifier, code_challenge) = if use_pkce {
            let verifier = random_hex(64)?;
            let challenge = compute_code_challenge(&verifier);
            (Some(verifier), Some(challenge))
        } else {
            (None, None)
        };

        Ok(Self {
            state,
            code_verifier,
            code_challenge,
            created_at: Utc::now(),
            redirect_uri: None,
        })
    }

    /// Set the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Check if this context has expired (5 minute lifetime).
    pub fn is_expired(&self) -> bool {
        Utc::now() - self.created_at > Duration::seconds(CONTEXT_LIFETIME_SECS)
    }
}

/// Random hex string built from `bytes` random bytes.
fn random_hex(bytes: usize) -> Result<String, getrandom::Error> {
    let mut buf = vec![0u8; bytes];
    getrandom::getrandom(&mut buf)?;

    let mut s = String::with_capacity(bytes * 2);
    for b in buf {
        // Writing to a String cannot fail.
        let _ = write!(s, "{:02x}", b);
    }
    Ok(s)
}

/// PKCE S256 challenge for a verifier.
fn compute_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
