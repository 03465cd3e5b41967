//! # webnode - Authenticated web-service adapters
//!
//! webnode lets a flow-based automation host call OAuth-protected web APIs
//! without handling token expiry itself. Each adapter node owns a credential
//! set and an authenticated client that refreshes the access token before it
//! expires and again when the service answers `401`, within a per-call retry
//! budget. Refreshed credentials are handed back to the host for storage.
//!
//! ## Quick Start
//!
//! ```ignore
//! use webnode::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     webnode::init_tracing()?;
//!
//!     let creds = CredentialSet::from_env("BOX").expect("BOX_ACCESS_TOKEN not set");
//!     let client = AuthenticatedApiClient::from_config(&box_config("id", "secret"), creds);
//!
//!     let response = client.send(&ApiCall::get("https://api.box.com/2.0/users/me")).await?;
//!     println!("{:?}", response.json());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description | Default |
//! |---------|-------------|--------|
//! | `nodes` | Box and Fitbit reference nodes | ✅ |
//! | `json-logs` | JSON output from [`init_tracing`] | ❌ |
//!
//! ## Architecture
//!
//! - [`webnode_auth`] - credentials, token refresh, authenticated requests,
//!   authorization flow and credential stores
//! - [`webnode_nodes`] - node surface and reference adapters (optional)

#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod logging;

pub use logging::{init_tracing, init_tracing_with, DEFAULT_FILTER};

/// Credential lifecycle and authenticated requests.
pub use webnode_auth as auth;

/// Node surface and reference adapters.
#[cfg(feature = "nodes")]
#[cfg_attr(docsrs, doc(cfg(feature = "nodes")))]
pub use webnode_nodes as nodes;

// Flat re-exports
pub use webnode_auth::{
    ApiCall, ApiError, ApiResponse, AuthenticatedApiClient, CredentialSet, CredentialSink,
    CredentialStore, ErrorKind, JsonFileCredentialStore, OAuthConfig, ResponseBody,
    SharedCredentials, DEFAULT_RETRY_BUDGET,
};

#[cfg(feature = "nodes")]
pub use webnode_nodes::{
    BoxNode, BoxOperation, FitbitDataType, FitbitNode, Message, Node, NodeError, NodeHost,
    NodeStatus,
};

/// Prelude for common imports.
pub mod prelude {
    pub use webnode_auth::prelude::*;

    #[cfg(feature = "nodes")]
    pub use webnode_nodes::{Message, Node, NodeError, NodeHost, NodeStatus};
}
