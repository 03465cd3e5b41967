//! OAuth configuration and per-service presets.

use serde::{Deserialize, Serialize};

/// How the client authenticates itself to the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuth {
    /// `client_id` / `client_secret` as form fields.
    #[default]
    RequestBody,
    /// HTTP Basic `Authorization` header built from client id and secret.
    BasicHeader,
}

/// Where the access token goes on authenticated calls.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPlacement {
    /// `Authorization: Bearer <token>`.
    #[default]
    BearerHeader,
    /// A query parameter with the given name.
    QueryParam(String),
}

/// Configuration for an OAuth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    #[serde(default, skip_serializing)]
    pub client_secret: String,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
    /// OAuth scopes (space-separated)
    #[serde(default)]
    pub scopes: String,
    /// Redirect URI host (e.g., "http://localhost")
    #[serde(default = "default_redirect_host")]
    pub redirect_host: String,
    /// Redirect URI path (e.g., "auth/callback")
    #[serde(default = "default_redirect_path")]
    pub redirect_path: String,
    /// Required port (Some(port) for fixed port, None for dynamic)
    #[serde(default)]
    pub required_port: Option<u16>,
    /// Port range for dynamic allocation (start, end inclusive)
    #[serde(default)]
    pub port_range: Option<(u16, u16)>,
    /// Callback timeout in seconds
    #[serde(default = "default_callback_timeout")]
    pub callback_timeout_secs: u64,
    /// Token endpoint client authentication
    #[serde(default)]
    pub client_auth: ClientAuth,
    /// Token placement on API calls
    #[serde(default)]
    pub token_placement: TokenPlacement,
    /// Send a PKCE challenge during authorization
    #[serde(default)]
    pub use_pkce: bool,
}

fn default_redirect_host() -> String {
    "http://localhost".to_string()
}

fn default_redirect_path() -> String {
    "callback".to_string()
}

fn default_callback_timeout() -> u64 {
    120
}

impl OAuthConfig {
    /// Create a new OAuth configuration.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            scopes: String::new(),
            redirect_host: default_redirect_host(),
            redirect_path: default_redirect_path(),
            required_port: None,
            port_range: Some((8765, 8795)),
            callback_timeout_secs: default_callback_timeout(),
            client_auth: ClientAuth::RequestBody,
            token_placement: TokenPlacement::BearerHeader,
            use_pkce: false,
        }
    }

    /// Set OAuth scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = scopes.into();
        self
    }

    /// Set required port (fixed port for callback).
    #[must_use]
    pub fn with_required_port(mut self, port: u16) -> Self {
        self.required_port = Some(port);
        self.port_range = None;
        self
    }

    /// Set port range for dynamic allocation.
    #[must_use]
    pub fn with_port_range(mut self, start: u16, end: u16) -> Self {
        self.port_range = Some((start, end));
        self.required_port = None;
        self
    }

    /// Let the OS pick the callback port.
    #[must_use]
    pub fn with_ephemeral_port(mut self) -> Self {
        self.port_range = None;
        self.required_port = None;
        self
    }

    /// Set callback timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.callback_timeout_secs = timeout_secs;
        self
    }

    /// Set redirect host.
    #[must_use]
    pub fn with_redirect_host(mut self, host: impl Into<String>) -> Self {
        self.redirect_host = host.into();
        self
    }

    /// Set redirect path.
    #[must_use]
    pub fn with_redirect_path(mut self, path: impl Into<String>) -> Self {
        self.redirect_path = path.into();
        self
    }

    /// Set token endpoint client authentication.
    #[must_use]
    pub fn with_client_auth(mut self, auth: ClientAuth) -> Self {
        self.client_auth = auth;
        self
    }

    /// Set where the access token is placed on API calls.
    #[must_use]
    pub fn with_token_placement(mut self, placement: TokenPlacement) -> Self {
        self.token_placement = placement;
        self
    }

    /// Enable or disable PKCE.
    #[must_use]
    pub fn with_pkce(mut self, enabled: bool) -> Self {
        self.use_pkce = enabled;
        self
    }

    /// Override the token endpoint (useful for proxies and tests).
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Build the redirect URI for a given port.
    pub fn redirect_uri(&self, port: u16) -> String {
        let host = self.redirect_host.trim_end_matches('/');
        let path = self.redirect_path.trim_start_matches('/');
        format!("{}:{}/{}", host, port, path)
    }

    /// The token endpoint settings used by refresh.
    pub fn token_endpoint(&self) -> TokenEndpoint {
        TokenEndpoint {
            token_url: self.token_url.clone(),
            client_auth: self.client_auth,
        }
    }

    /// Load from environment variables with given prefix.
    ///
    /// Looks for:
    /// - `{PREFIX}_CLIENT_ID`
    /// - `{PREFIX}_CLIENT_SECRET`
    /// - `{PREFIX}_AUTH_URL`
    /// - `{PREFIX}_TOKEN_URL`
    /// - `{PREFIX}_SCOPES`
    ///
    /// Returns `None` unless client id, auth URL and token URL are all set.
    pub fn from_env(prefix: &str) -> Option<Self> {
        let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).ok();

        let config = Self::new(
            var("CLIENT_ID")?,
            var("CLIENT_SECRET").unwrap_or_default(),
            var("AUTH_URL")?,
            var("TOKEN_URL")?,
        );

        Some(match var("SCOPES") {
            Some(scopes) => config.with_scopes(scopes),
            None => config,
        })
    }
}

/// Token endpoint settings needed to refresh an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEndpoint {
    /// Token endpoint URL.
    pub token_url: String,
    /// How the client authenticates to it.
    #[serde(default)]
    pub client_auth: ClientAuth,
}

impl TokenEndpoint {
    /// Create a token endpoint using form-field client authentication.
    pub fn new(token_url: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            client_auth: ClientAuth::RequestBody,
        }
    }

    /// Set client authentication.
    #[must_use]
    pub fn with_client_auth(mut self, auth: ClientAuth) -> Self {
        self.client_auth = auth;
        self
    }
}

/// Box OAuth configuration.
pub fn box_config(client_id: impl Into<String>, client_secret: impl Into<String>) -> OAuthConfig {
    OAuthConfig::new(
        client_id,
        client_secret,
        "https://account.box.com/api/oauth2/authorize",
        "https://api.box.com/oauth2/token",
    )
    .with_redirect_path("box-credentials/auth/callback")
}

/// Fitbit OAuth configuration.
pub fn fitbit_config(
    client_id: impl Into<String>,
    client_secret: impl Into<String>,
) -> OAuthConfig {
    OAuthConfig::new(
        client_id,
        client_secret,
        "https://www.fitbit.com/oauth2/authorize",
        "https://api.fitbit.com/oauth2/token",
    )
    .with_scopes("activity heartrate profile sleep weight")
    .with_client_auth(ClientAuth::BasicHeader)
    .with_pkce(true)
    .with_redirect_path("fitbit-credentials/auth/callback")
}

/// Google OAuth configuration.
pub fn google_config(
    client_id: impl Into<String>,
    client_secret: impl Into<String>,
) -> OAuthConfig {
    OAuthConfig::new(
        client_id,
        client_secret,
        "https://accounts.google.com/o/oauth2/v2/auth",
        "https://oauth2.googleapis.com/token",
    )
    .with_scopes("openid profile email")
    .with_redirect_path("google-credentials/auth/callback")
}

/// Dropbox OAuth configuration.
pub fn dropbox_config(
    client_id: impl Into<String>,
    client_secret: impl Into<String>,
) -> OAuthConfig {
    OAuthConfig::new(
        client_id,
        client_secret,
        "https://www.dropbox.com/oauth2/authorize",
        "https://api.dropboxapi.com/oauth2/token",
    )
    .with_redirect_path("dropbox-credentials/auth/callback")
}

/// Foursquare OAuth configuration.
///
/// Foursquare tokens do not expire and are passed as `oauth_token`.
pub fn foursquare_config(
    client_id: impl Into<String>,
    client_secret: impl Into<String>,
) -> OAuthConfig {
    OAuthConfig::new(
        client_id,
        client_secret,
        "https://foursquare.com/oauth2/authenticate",
        "https://foursquare.com/oauth2/access_token",
    )
    .with_token_placement(TokenPlacement::QueryParam("oauth_token".to_string()))
    .with_redirect_path("foursquare-credentials/auth/callback")
}

/// Instagram OAuth configuration.
pub fn instagram_config(
    client_id: impl Into<String>,
    client_secret: impl Into<String>,
) -> OAuthConfig {
    OAuthConfig::new(
        client_id,
        client_secret,
        "https://api.instagram.com/oauth/authorize",
        "https://api.instagram.com/oauth/access_token",
    )
    .with_scopes("user_profile user_media")
    .with_token_placement(TokenPlacement::QueryParam("access_token".to_string()))
    .with_redirect_path("instagram-credentials/auth/callback")
}
