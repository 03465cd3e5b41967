//! Responses returned by the authenticated client.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Body of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Parsed JSON.
    Json(Value),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// No content.
    Empty,
}

impl ResponseBody {
    /// Get the JSON value, if this is a JSON body.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Json(_) => false,
            Self::Text(s) => s.is_empty(),
            Self::Bytes(b) => b.is_empty(),
            Self::Empty => true,
        }
    }
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: ResponseBody,
}

impl ApiResponse {
    /// Borrow the JSON body.
    pub fn json(&self) -> Option<&Value> {
        self.body.as_json()
    }

    /// Take the JSON body, or `Value::Null` for non-JSON bodies.
    pub fn into_json(self) -> Value {
        match self.body {
            ResponseBody::Json(v) => v,
            _ => Value::Null,
        }
    }

    /// Deserialize the JSON body into a typed value.
    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.body {
            ResponseBody::Json(v) => T::deserialize(v),
            ResponseBody::Text(s) => serde_json::from_str(s),
            ResponseBody::Bytes(b) => serde_json::from_slice(b),
            ResponseBody::Empty => serde_json::from_str("null"),
        }
    }

    /// Get a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
