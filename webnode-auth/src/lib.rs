//! # webnode-auth
//!
//! OAuth credential lifecycle and authenticated HTTP for webnode adapters.
//!
//! Every service adapter holds one [`CredentialSet`] and sends its calls
//! through an [`AuthenticatedApiClient`], which keeps the access token fresh:
//!
//! - **Pre-emptive refresh**: a token past its `expires_at` is renewed before
//!   the call goes out.
//! - **Reactive refresh**: a `401 Unauthorized` triggers one renewal and a
//!   retry, bounded by a per-call retry budget.
//! - **Persistence hook**: renewed credentials are handed to a
//!   [`CredentialSink`] so the host can store them.
//!
//! ## Core Concepts
//!
//! - **[`CredentialSet`]** / **[`SharedCredentials`]**: token state and the
//!   handle clients mutate on refresh
//! - **[`OAuthConfig`]**: provider endpoints, client authentication and token
//!   placement, with presets for common services
//! - **[`ApiCall`]** / **[`ApiResponse`]**: a request description and its
//!   decoded result
//! - **[`ApiError`]**: every failure, classified by [`ErrorKind`]
//! - **[`flow`]**: the authorization-code flow that produces the first
//!   credential set
//!
//! ## Example
//!
//! ```ignore
//! use webnode_auth::prelude::*;
//!
//! let config = box_config("client-id", "client-secret");
//! let creds = CredentialSet::new("access")
//!     .with_refresh_token("refresh")
//!     .expires_in(3600)
//!     .with_client("client-id", "client-secret");
//!
//! let client = AuthenticatedApiClient::from_config(&config, creds);
//! let response = client
//!     .send(&ApiCall::get("https://api.box.com/2.0/users/me"))
//!     .await?;
//! println!("{:?}", response.json());
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod flow;
pub mod persist;
pub mod refresh;
pub mod request;
pub mod response;
pub mod store;

// Re-exports
pub use client::{AuthenticatedApiClient, AuthenticatedApiClientBuilder, DEFAULT_RETRY_BUDGET};
pub use config::{
    box_config, dropbox_config, fitbit_config, foursquare_config, google_config,
    instagram_config, ClientAuth, OAuthConfig, TokenEndpoint, TokenPlacement,
};
pub use credentials::{CredentialSet, SharedCredentials};
pub use error::{extract_error_message, ApiError, ErrorKind};
pub use flow::{
    authorization_url, exchange_code, start_authorization, AuthorizationContext,
    AuthorizationHandle, FlowError,
};
pub use persist::{BoxedSink, CredentialSink, FnSink, NoopSink};
pub use refresh::{refresh_tokens, TokenResponse};
pub use request::{ApiCall, RequestBody};
pub use response::{ApiResponse, ResponseBody};
pub use store::{CredentialStore, JsonFileCredentialStore, MemoryCredentialStore, StoreError};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        box_config, fitbit_config, ApiCall, ApiError, ApiResponse, AuthenticatedApiClient,
        CredentialSet, CredentialSink, ErrorKind, OAuthConfig, ResponseBody, SharedCredentials,
        TokenPlacement,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let creds = CredentialSet::new("a").with_refresh_token("r");
        assert!(creds.has_refresh_token());
        assert_eq!(ApiError::NoRefreshToken.kind(), ErrorKind::NoRefreshToken);
    }

    #[test]
    fn test_default_budget() {
        assert_eq!(DEFAULT_RETRY_BUDGET, 1);
    }

    #[test]
    fn test_client_from_preset() {
        let config = fitbit_config("id", "secret");
        let client = AuthenticatedApiClient::from_config(&config, CredentialSet::new("a"));
        let creds = client.credentials().snapshot();
        assert_eq!(creds.client_id, "id");
        assert_eq!(creds.client_secret, "secret");
    }
}
