//! Error types for authenticated requests.
//!
//! Every failure of [`AuthenticatedApiClient::request`](crate::AuthenticatedApiClient::request)
//! is terminal for that call. Nothing here is retried beyond the caller's
//! retry budget.

use crate::response::ResponseBody;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors returned by the authenticated client and the refresh step.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A refresh was needed but the credential set holds no refresh token.
    #[error("No refresh token available; re-authorization required")]
    NoRefreshToken,

    /// The token endpoint rejected the refresh or could not be reached.
    #[error("Token refresh failed{}: {detail}", fmt_status(.status))]
    RefreshFailed {
        /// HTTP status of the refresh response, if one was received.
        status: Option<u16>,
        /// Upstream error detail.
        detail: String,
    },

    /// The call still needed a refresh after its retry budget ran out.
    #[error("Too many refresh attempts{}", fmt_status(.status))]
    RetryBudgetExhausted {
        /// Status of the last response, if the exhaustion followed a response.
        status: Option<u16>,
    },

    /// The HTTP call itself failed (connection, TLS, timeout, body decoding).
    #[error("Transport error: {message}")]
    Transport {
        /// Transport failure description.
        message: String,
        /// Body received alongside the failure, if any.
        body: Option<ResponseBody>,
    },

    /// The API answered with a status of 400 or above.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
        /// Parsed response body, if it was JSON.
        body: Option<Value>,
    },

    /// The call description could not be turned into an HTTP request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Flat classification of [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ApiError::NoRefreshToken`].
    NoRefreshToken,
    /// See [`ApiError::RefreshFailed`].
    RefreshFailed,
    /// See [`ApiError::RetryBudgetExhausted`].
    RetryBudgetExhausted,
    /// See [`ApiError::Transport`].
    Transport,
    /// See [`ApiError::Api`].
    ApiError,
    /// See [`ApiError::InvalidRequest`].
    InvalidRequest,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoRefreshToken => "no_refresh_token",
            Self::RefreshFailed => "refresh_failed",
            Self::RetryBudgetExhausted => "retry_budget_exhausted",
            Self::Transport => "transport",
            Self::ApiError => "api_error",
            Self::InvalidRequest => "invalid_request",
        };
        f.write_str(s)
    }
}

impl ApiError {
    /// Create an API error from a status and an optional JSON body.
    pub fn api(status: u16, body: Option<Value>) -> Self {
        let message = body
            .as_ref()
            .and_then(extract_error_message)
            .unwrap_or_else(|| canonical_reason(status));
        Self::Api {
            status,
            message,
            body,
        }
    }

    /// Create a transport error without a body.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            body: None,
        }
    }

    /// Create a refresh failure.
    pub fn refresh_failed(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::RefreshFailed {
            status,
            detail: detail.into(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoRefreshToken => ErrorKind::NoRefreshToken,
            Self::RefreshFailed { .. } => ErrorKind::RefreshFailed,
            Self::RetryBudgetExhausted { .. } => ErrorKind::RetryBudgetExhausted,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Api { .. } => ErrorKind::ApiError,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Get the upstream HTTP status, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RefreshFailed { status, .. } | Self::RetryBudgetExhausted { status } => *status,
            _ => None,
        }
    }

    /// Whether the grant looks revoked and the user must authorize again.
    ///
    /// Callers should not blindly retry these.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(self, Self::NoRefreshToken | Self::RefreshFailed { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else if err.is_timeout() {
            ApiError::transport(format!("request timed out: {err}"))
        } else if err.is_connect() {
            ApiError::transport(format!("connection failed: {err}"))
        } else {
            ApiError::transport(err.to_string())
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Services disagree on where they put it: Box uses a top-level `message`,
/// Google nests it under `error.message`, Fitbit returns an `errors` array and
/// OAuth token endpoints use `error_description` / `error`.
pub fn extract_error_message(body: &Value) -> Option<String> {
    let candidates = [
        body.get("message"),
        body.pointer("/error/message"),
        body.pointer("/errors/0/message"),
        body.pointer("/meta/errorDetail"),
        body.get("error_description"),
        body.get("error"),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().filter(|s| !s.is_empty()))
        .map(str::to_string)
}

fn canonical_reason(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}
