//! OAuth2 authorization-code flow that produces the initial credential set.
//!
//! The flow only obtains credentials. Storing them is left to the caller,
//! typically through a [`CredentialStore`](crate::store::CredentialStore).

mod context;
mod server;

pub use context::AuthorizationContext;
pub use server::{CallbackError, CallbackResult, CallbackServer};

use crate::config::{ClientAuth, OAuthConfig};
use crate::credentials::CredentialSet;
use crate::error::extract_error_message;
use crate::refresh::TokenResponse;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Errors that can occur during the authorization flow.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Failed to start callback server: {0}")]
    ServerStart(#[from] std::io::Error),
    #[error("Callback error: {0}")]
    Callback(#[from] CallbackError),
    #[error("State mismatch: expected {expected}, got {actual}")]
    StateMismatch { expected: String, actual: String },
    #[error("Authorization expired before the callback arrived")]
    Expired,
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Random source unavailable: {0}")]
    Random(#[from] getrandom::Error),
}

/// Start an authorization.
///
/// Binds the callback server, then returns the URL the user must open together
/// with a handle that waits for the redirect and exchanges the code.
pub fn start_authorization(
    config: &OAuthConfig,
) -> Result<(String, AuthorizationHandle), FlowError> {
    let server = CallbackServer::start(config)?;
    let redirect_uri = config.redirect_uri(server.port());
    let context = AuthorizationContext::new(config.use_pkce)?.with_redirect_uri(redirect_uri);

    let url = authorization_url(config, &context);
    debug!(port = server.port(), pkce = config.use_pkce, "Authorization started");

    let handle = AuthorizationHandle {
        server,
        context,
        config: config.clone(),
        http: Client::new(),
    };

    Ok((url, handle))
}

/// Handle to a pending authorization.
#[derive(Debug)]
pub struct AuthorizationHandle {
    server: CallbackServer,
    context: AuthorizationContext,
    config: OAuthConfig,
    http: Client,
}

impl AuthorizationHandle {
    /// Port the callback server is listening on.
    pub fn port(&self) -> u16 {
        self.server.port()
    }

    /// Redirect URI registered for this authorization.
    pub fn redirect_uri(&self) -> &str {
        self.context.redirect_uri.as_deref().unwrap_or("")
    }

    /// Use a specific HTTP client for the code exchange.
    #[must_use]
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Wait for the redirect, check its state and exchange the code.
    pub async fn wait_for_credentials(self) -> Result<CredentialSet, FlowError> {
        let timeout = Duration::from_secs(self.config.callback_timeout_secs);
        let result = self.server.wait_for_callback(timeout).await?;

        if result.state != self.context.state {
            return Err(FlowError::StateMismatch {
                expected: self.context.state,
                actual: result.state,
            });
        }
        if self.context.is_expired() {
            return Err(FlowError::Expired);
        }

        exchange_code(&self.http, &self.config, &self.context, &result.code).await
    }
}

/// Build the URL that sends the user to the provider's consent page.
pub fn authorization_url(config: &OAuthConfig, context: &AuthorizationContext) -> String {
    let redirect_uri = context.redirect_uri.as_deref().unwrap_or("");

    let mut params = vec![
        ("response_type", "code"),
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", redirect_uri),
    ];
    if !config.scopes.is_empty() {
        params.push(("scope", config.scopes.as_str()));
    }
    params.push(("state", context.state.as_str()));
    if let Some(challenge) = context.code_challenge.as_deref() {
        params.push(("code_challenge", challenge));
        params.push(("code_challenge_method", "S256"));
    }

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if config.auth_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", config.auth_url, separator, query)
}

/// Exchange an authorization code for a credential set.
///
/// The returned set carries the configured client id and secret so later
/// refreshes can authenticate.
pub async fn exchange_code(
    http: &Client,
    config: &OAuthConfig,
    context: &AuthorizationContext,
    code: &str,
) -> Result<CredentialSet, FlowError> {
    let redirect_uri = context.redirect_uri.as_deref().unwrap_or("");

    let mut params = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];
    if let Some(verifier) = context.code_verifier.as_deref() {
        params.push(("code_verifier", verifier));
    }

    let mut request = http
        .post(&config.token_url)
        .header("Accept", "application/json");

    match config.client_auth {
        ClientAuth::RequestBody => {
            params.push(("client_id", config.client_id.as_str()));
            params.push(("client_secret", config.client_secret.as_str()));
        }
        ClientAuth::BasicHeader => {
            params.push(("client_id", config.client_id.as_str()));
            request = request.basic_auth(&config.client_id, Some(&config.client_secret));
        }
    }

    debug!(token_url = %config.token_url, "Exchanging authorization code");

    let response = request.form(&params).send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let detail = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .as_ref()
            .and_then(extract_error_message)
            .unwrap_or(text);
        return Err(FlowError::TokenExchange(format!("HTTP {}: {}", status, detail)));
    }

    let tokens: TokenResponse = serde_json::from_str(&text)
        .map_err(|e| FlowError::TokenExchange(format!("invalid token response: {e}")))?;

    Ok(CredentialSet::new(String::new())
        .with_client(config.client_id.clone(), config.client_secret.clone())
        .apply_refresh(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(token_url: &str) -> OAuthConfig {
        OAuthConfig::new("cid", "csecret", "https://auth.example.com/authorize", token_url)
            .with_scopes("read write")
            .with_ephemeral_port()
    }

    fn context() -> AuthorizationContext {
        AuthorizationContext::new(false)
            .unwrap()
            .with_redirect_uri("http://localhost:9000/callback")
    }

    #[test]
    fn test_random_source_error_converts() {
        let err = FlowError::from(getrandom::Error::UNSUPPORTED);
        assert!(matches!(err, FlowError::Random(_)));
        assert!(err.to_string().starts_with("Random source unavailable"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_authorization_url_without_pkce() {
        let ctx = context();
        let url = authorization_url(&config("https://t"), &ctx);

        assert!(url.starts_with("https://auth.example.com/authorize?response_type=code"));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A9000%2Fcallback"));
        assert!(url.contains("scope=read%20write"));
        assert!(url.contains(&format!("state={}", ctx.state)));
        assert!(!url.contains("code_challenge"));
    }

    #[test]
    fn test_authorization_url_with_pkce() {
        let ctx = AuthorizationContext::new(true).unwrap();
        let cfg = config("https://t").with_pkce(true);
        let url = authorization_url(&cfg, &ctx);

        let challenge = ctx.code_challenge.as_deref().unwrap();
        assert!(url.contains(&format!("code_challenge={}", challenge)));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn test_authorization_url_keeps_existing_query() {
        let cfg = OAuthConfig::new("cid", "s", "https://a.example.com/auth?access_type=offline", "https://t");
        let url = authorization_url(&cfg, &context());
        assert!(url.starts_with("https://a.example.com/auth?access_type=offline&response_type=code"));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("client_secret=csecret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A",
                "refresh_token": "R",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config(&format!("{}/token", server.uri()));
        let creds = exchange_code(&Client::new(), &cfg, &context(), "the-code")
            .await
            .unwrap();

        assert_eq!(creds.access_token, "A");
        assert_eq!(creds.refresh_token.as_deref(), Some("R"));
        assert_eq!(creds.client_id, "cid");
        assert_eq!(creds.client_secret, "csecret");
        assert!(creds.expires_at.is_some());
        assert!(!creds.is_expired());
    }

    #[tokio::test]
    async fn test_exchange_code_basic_auth_and_verifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("authorization", "Basic Y2lkOmNzZWNyZXQ="))
            .and(body_string_contains("code_verifier="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config(&format!("{}/token", server.uri()))
            .with_client_auth(ClientAuth::BasicHeader)
            .with_pkce(true);
        let ctx = AuthorizationContext::new(true)
            .unwrap()
            .with_redirect_uri("http://localhost:9000/callback");

        let creds = exchange_code(&Client::new(), &cfg, &ctx, "c").await.unwrap();
        assert_eq!(creds.refresh_token, None);
        assert_eq!(creds.expires_at, None);
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Code expired"
            })))
            .mount(&server)
            .await;

        let cfg = config(&format!("{}/token", server.uri()));
        let err = exchange_code(&Client::new(), &cfg, &context(), "old")
            .await
            .unwrap_err();

        match err {
            FlowError::TokenExchange(msg) => assert!(msg.contains("Code expired"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    async fn redirect(port: u16, query: &str) {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream
            .write_all(format!("GET /callback?{} HTTP/1.1\r\n\r\n", query).as_bytes())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_flow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=xyz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A",
                "refresh_token": "R"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config(&format!("{}/token", server.uri()));
        let (url, handle) = start_authorization(&cfg).unwrap();
        let port = handle.port();
        assert!(handle.redirect_uri().ends_with(&format!(":{}/callback", port)));

        let state = url
            .split('&')
            .find_map(|p| p.strip_prefix("state="))
            .unwrap()
            .to_string();

        let waiter = tokio::spawn(handle.wait_for_credentials());
        redirect(port, &format!("code=xyz&state={}", state)).await;

        let creds = waiter.await.unwrap().unwrap();
        assert_eq!(creds.access_token, "A");
    }

    #[tokio::test]
    async fn test_state_mismatch() {
        let cfg = config("http://127.0.0.1:1/token");
        let (_url, handle) = start_authorization(&cfg).unwrap();
        let port = handle.port();

        let waiter = tokio::spawn(handle.wait_for_credentials());
        redirect(port, "code=xyz&state=forged").await;

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, FlowError::StateMismatch { ref actual, .. } if actual == "forged"));
    }

    #[tokio::test]
    async fn test_provider_denial_surfaces() {
        let cfg = config("http://127.0.0.1:1/token");
        let (_url, handle) = start_authorization(&cfg).unwrap();
        let port = handle.port();

        let waiter = tokio::spawn(handle.wait_for_credentials());
        redirect(port, "error=access_denied").await;

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            FlowError::Callback(CallbackError::Denied(ref reason)) if reason == "access_denied"
        ));
    }
}
