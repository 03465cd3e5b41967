//! Token refresh against an OAuth token endpoint.

use crate::config::{ClientAuth, TokenEndpoint};
use crate::credentials::CredentialSet;
use crate::error::{extract_error_message, ApiError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Token response from OAuth token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Exchange a refresh token for a new access token.
///
/// Sends the standard refresh grant: `grant_type=refresh_token`,
/// `refresh_token`, and the client credentials either as form fields or as a
/// Basic header depending on the endpoint.
///
/// **Important**: This function does NOT update or store anything. The caller
/// applies the returned tokens.
pub async fn refresh_tokens(
    client: &Client,
    endpoint: &TokenEndpoint,
    credentials: &CredentialSet,
) -> Result<TokenResponse, ApiError> {
    let refresh_token = credentials
        .refresh_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::NoRefreshToken)?;

    let mut params = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];

    let mut request = client
        .post(&endpoint.token_url)
        .header("Accept", "application/json");

    match endpoint.client_auth {
        ClientAuth::RequestBody => {
            params.push(("client_id", credentials.client_id.as_str()));
            params.push(("client_secret", credentials.client_secret.as_str()));
        }
        ClientAuth::BasicHeader => {
            request = request.basic_auth(&credentials.client_id, Some(&credentials.client_secret));
        }
    }

    debug!(token_url = %endpoint.token_url, "Refreshing access token");

    let response = request
        .form(&params)
        .send()
        .await
        .map_err(|e| ApiError::refresh_failed(None, e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::refresh_failed(Some(status.as_u16()), e.to_string()))?;

    if !status.is_success() {
        let detail = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .as_ref()
            .and_then(extract_error_message)
            .unwrap_or_else(|| format!("HTTP {}: {}", status, text));
        return Err(ApiError::refresh_failed(Some(status.as_u16()), detail));
    }

    serde_json::from_str::<TokenResponse>(&text).map_err(|e| {
        ApiError::refresh_failed(
            Some(status.as_u16()),
            format!("invalid token response: {e}"),
        )
    })
}
