//! Descriptions of authenticated HTTP calls.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body.
    #[default]
    None,
    /// JSON body.
    Json(Value),
    /// URL-encoded form fields.
    Form(Vec<(String, String)>),
    /// Plain text body.
    Text(String),
}

/// One HTTP call to be made on behalf of a credential set.
///
/// Any `Authorization` header set here is replaced with the client's current
/// access token when the call is sent.
#[derive(Debug, Clone)]
pub struct ApiCall {
    /// HTTP method.
    pub method: Method,
    /// Target URL.
    pub url: String,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Query parameters appended to the URL.
    pub query: Vec<(String, String)>,
    /// Request body.
    pub body: RequestBody,
    /// Parse the response body as JSON.
    pub parse_json: bool,
    /// Timeout for this call (not applied to token refresh).
    pub timeout: Option<Duration>,
}

impl ApiCall {
    /// Create a call with the given method.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::None,
            parse_json: true,
            timeout: None,
        }
    }

    /// Create a GET call.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST call.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Create a PUT call.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// Create a DELETE call.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set a JSON body.
    #[must_use]
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = RequestBody::Json(serde_json::to_value(body).unwrap_or(Value::Null));
        self
    }

    /// Set form fields as the body.
    #[must_use]
    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Set a plain text body.
    #[must_use]
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Text(body.into());
        self
    }

    /// Keep the response body raw instead of parsing JSON.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.parse_json = false;
        self
    }

    /// Set the timeout for this call.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
