//! Authenticated API client with token refresh.
//!
//! [`AuthenticatedApiClient::request`] performs one logical call:
//!
//! 1. The current access token always replaces whatever auth the call carries.
//! 2. If the credential set is known to be expired, the token is refreshed
//!    first. After such a pre-emptive refresh exactly one more attempt is
//!    allowed, whatever budget the caller passed.
//! 3. A 401 response with budget left costs one unit of budget, triggers a
//!    refresh and the call is tried again.
//! 4. Any other status of 400 or above is returned as [`ApiError::Api`].
//!
//! Concurrent calls sharing one [`SharedCredentials`] are not coordinated: two
//! calls that both see an expired token will both refresh.

use crate::config::{OAuthConfig, TokenEndpoint, TokenPlacement};
use crate::credentials::SharedCredentials;
use crate::error::ApiError;
use crate::persist::{BoxedSink, CredentialSink, NoopSink};
use crate::refresh::refresh_tokens;
use crate::request::{ApiCall, RequestBody};
use crate::response::{ApiResponse, ResponseBody};
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Retry budget used by [`AuthenticatedApiClient::send`].
pub const DEFAULT_RETRY_BUDGET: u32 = 1;

/// HTTP client that authenticates calls with a refreshable credential set.
#[derive(Clone)]
pub struct AuthenticatedApiClient {
    http: Client,
    credentials: SharedCredentials,
    endpoint: TokenEndpoint,
    placement: TokenPlacement,
    sink: BoxedSink,
    key: String,
}

impl AuthenticatedApiClient {
    /// Start building a client.
    pub fn builder(
        credentials: impl Into<SharedCredentials>,
        endpoint: TokenEndpoint,
    ) -> AuthenticatedApiClientBuilder {
        AuthenticatedApiClientBuilder::new(credentials.into(), endpoint)
    }

    /// Build a client from an OAuth configuration.
    ///
    /// Client id and secret missing from the credential set are filled in
    /// from the configuration.
    pub fn from_config(config: &OAuthConfig, credentials: impl Into<SharedCredentials>) -> Self {
        let credentials = credentials.into();
        let mut current = credentials.snapshot();
        if current.client_id.is_empty() && current.client_secret.is_empty() {
            current.client_id = config.client_id.clone();
            current.client_secret = config.client_secret.clone();
            credentials.replace(current);
        }

        Self::builder(credentials, config.token_endpoint())
            .token_placement(config.token_placement.clone())
            .build()
    }

    /// The shared credential handle.
    pub fn credentials(&self) -> &SharedCredentials {
        &self.credentials
    }

    /// Key passed to the persistence hook.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Perform a call with the default retry budget.
    pub async fn send(&self, call: &ApiCall) -> Result<ApiResponse, ApiError> {
        self.request(call, DEFAULT_RETRY_BUDGET).await
    }

    /// Perform one logical authenticated call.
    ///
    /// `retry_budget` is the number of refresh-and-retry cycles allowed.
    pub async fn request(
        &self,
        call: &ApiCall,
        retry_budget: u32,
    ) -> Result<ApiResponse, ApiError> {
        let mut budget = retry_budget;
        let mut refreshed = false;

        loop {
            let credentials = self.credentials.snapshot();

            if credentials.is_expired() {
                if budget == 0 {
                    return Err(ApiError::RetryBudgetExhausted { status: None });
                }

                debug!(key = %self.key, "Access token expired, refreshing before request");
                self.refresh().await?;
                refreshed = true;
                // Only one attempt follows a pre-emptive refresh.
                budget = 0;
                continue;
            }

            let response = self.dispatch(call, &credentials.access_token).await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                if budget > 0 {
                    budget -= 1;
                    debug!(
                        key = %self.key,
                        remaining_budget = budget,
                        "Request unauthorized, refreshing and retrying"
                    );
                    self.refresh().await?;
                    refreshed = true;
                    continue;
                }

                if refreshed {
                    return Err(ApiError::RetryBudgetExhausted {
                        status: Some(status.as_u16()),
                    });
                }
            }

            if status.as_u16() >= 400 {
                return Err(error_from_response(response).await);
            }

            return read_response(response, call.parse_json).await;
        }
    }

    /// Refresh the access token and atomically replace the credential set.
    ///
    /// The persistence hook is notified after the replacement. A failing hook
    /// is logged and does not fail the refresh.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let current = self.credentials.snapshot();
        if !current.has_refresh_token() {
            return Err(ApiError::NoRefreshToken);
        }

        let tokens = refresh_tokens(&self.http, &self.endpoint, &current).await?;
        let updated = current.apply_refresh(tokens);
        self.credentials.replace(updated.clone());

        debug!(
            key = %self.key,
            expires_at = ?updated.expires_at,
            "Access token refreshed"
        );

        if let Err(e) = self.sink.persist(&self.key, &updated).await {
            warn!(key = %self.key, error = %e, "Failed to persist refreshed credentials");
        }

        Ok(())
    }

    async fn dispatch(&self, call: &ApiCall, access_token: &str) -> Result<Response, ApiError> {
        let url = self.authorized_url(call, access_token)?;

        let mut request = self.http.request(call.method.clone(), url);

        for (name, value) in &call.headers {
            if name.eq_ignore_ascii_case("authorization") {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }

        if self.placement == TokenPlacement::BearerHeader {
            request = request.bearer_auth(access_token);
        }

        request = match &call.body {
            RequestBody::None => request,
            RequestBody::Json(value) => request.json(value),
            RequestBody::Form(fields) => request.form(fields),
            RequestBody::Text(text) => request.body(text.clone()),
        };

        if let Some(timeout) = call.timeout {
            request = request.timeout(timeout);
        }

        debug!(method = %call.method, url = %call.url, "Sending authenticated request");

        request.send().await.map_err(ApiError::from)
    }

    fn authorized_url(&self, call: &ApiCall, access_token: &str) -> Result<Url, ApiError> {
        let mut url = Url::parse(&call.url)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid URL {}: {e}", call.url)))?;

        let token_param = match &self.placement {
            TokenPlacement::QueryParam(name) => Some(name.as_str()),
            TokenPlacement::BearerHeader => None,
        };

        if token_param.is_none() && call.query.is_empty() {
            return Ok(url);
        }

        // Any token already in the URL or the call's query is dropped.
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .chain(call.query.iter().cloned())
            .filter(|(k, _)| token_param != Some(k.as_str()))
            .collect();

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (k, v) in &pairs {
                query.append_pair(k, v);
            }
            if let Some(name) = token_param {
                query.append_pair(name, access_token);
            }
        }

        Ok(url)
    }
}

impl fmt::Debug for AuthenticatedApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedApiClient")
            .field("key", &self.key)
            .field("endpoint", &self.endpoint)
            .field("placement", &self.placement)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

async fn read_response(response: Response, parse_json: bool) -> Result<ApiResponse, ApiError> {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let bytes = response.bytes().await.map_err(ApiError::from)?;

    let body = if bytes.is_empty() {
        ResponseBody::Empty
    } else if parse_json {
        match serde_json::from_slice(&bytes) {
            Ok(value) => ResponseBody::Json(value),
            Err(e) => {
                return Err(ApiError::Transport {
                    message: format!("invalid JSON in response body: {e}"),
                    body: Some(raw_body(bytes)),
                });
            }
        }
    } else {
        ResponseBody::Bytes(bytes)
    };

    Ok(ApiResponse {
        status,
        headers,
        body,
    })
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(status, error = %e, "Failed to read error response body");
            Bytes::new()
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => ApiError::api(status, Some(value)),
        Err(_) => {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            if text.is_empty() || text.len() > 200 {
                ApiError::api(status, None)
            } else {
                ApiError::Api {
                    status,
                    message: text,
                    body: None,
                }
            }
        }
    }
}

fn raw_body(bytes: Bytes) -> ResponseBody {
    match String::from_utf8(bytes.to_vec()) {
        Ok(text) => ResponseBody::Text(text),
        Err(_) => ResponseBody::Bytes(bytes),
    }
}

/// Builder for [`AuthenticatedApiClient`].
#[derive(Default)]
pub struct AuthenticatedApiClientBuilder {
    credentials: SharedCredentials,
    endpoint: Option<TokenEndpoint>,
    client: Option<Client>,
    sink: Option<BoxedSink>,
    placement: TokenPlacement,
    key: Option<String>,
    timeout: Option<Duration>,
}

impl AuthenticatedApiClientBuilder {
    /// Create a new builder.
    pub fn new(credentials: SharedCredentials, endpoint: TokenEndpoint) -> Self {
        Self {
            credentials,
            endpoint: Some(endpoint),
            ..Default::default()
        }
    }

    /// Set the underlying HTTP client.
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the persistence hook.
    #[must_use]
    pub fn sink(mut self, sink: impl CredentialSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Set a shared persistence hook.
    #[must_use]
    pub fn shared_sink(mut self, sink: BoxedSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set where the access token is placed.
    #[must_use]
    pub fn token_placement(mut self, placement: TokenPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Set the key passed to the persistence hook.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set a transport-wide timeout on the default HTTP client (ignored with a
    /// custom client).
    ///
    /// This bounds every request the client sends, token refresh included.
    /// Use [`ApiCall::timeout`] to limit only the API call itself.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> AuthenticatedApiClient {
        let http = self.client.unwrap_or_else(|| {
            let mut builder = Client::builder();
            if let Some(timeout) = self.timeout {
                builder = builder.timeout(timeout);
            }
            builder.build().unwrap_or_default()
        });

        AuthenticatedApiClient {
            http,
            credentials: self.credentials,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| TokenEndpoint::new(String::new())),
            placement: self.placement,
            sink: self.sink.unwrap_or_else(|| Arc::new(NoopSink)),
            key: self.key.unwrap_or_default(),
        }
    }
}
