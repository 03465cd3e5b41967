//! Messages passed between nodes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A message flowing through the host runtime.
///
/// Fields the host attaches that this crate does not model are kept in
/// `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Host-assigned message id.
    #[serde(rename = "_msgid", default)]
    pub id: String,
    /// Optional topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Main payload.
    #[serde(default)]
    pub payload: Value,
    /// Binary payload for downloads. Not serialized.
    #[serde(skip)]
    pub binary: Option<Bytes>,
    /// Any other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Create a message with the given payload.
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            ..Default::default()
        }
    }

    /// Set the message id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set an extra field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Get an extra field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Get an extra field as a non-empty string.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Replace the payload, keeping id, topic and extra fields.
    #[must_use]
    pub fn reply(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self.binary = None;
        self
    }

    /// Replace the payload with binary data.
    #[must_use]
    pub fn reply_binary(mut self, data: Bytes) -> Self {
        self.payload = Value::Null;
        self.binary = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_host_fields_survive_roundtrip() {
        let raw = json!({
            "_msgid": "abc",
            "topic": "t",
            "payload": {"x": 1},
            "date": "2024-01-15",
            "req": {"id": 7}
        });

        let msg: Message = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(msg.id, "abc");
        assert_eq!(msg.field_str("date"), Some("2024-01-15"));
        assert_eq!(serde_json::to_value(&msg).unwrap(), raw);
    }

    #[test]
    fn test_reply_keeps_context() {
        let msg = Message::new("in").with_id("m1").with_field("date", "today");
        let out = msg.reply(json!([1, 2]));
        assert_eq!(out.id, "m1");
        assert_eq!(out.payload, json!([1, 2]));
        assert_eq!(out.field_str("date"), Some("today"));
    }

    #[test]
    fn test_reply_binary() {
        let out = Message::new("in").reply_binary(Bytes::from_static(b"data"));
        assert_eq!(out.payload, Value::Null);
        assert_eq!(out.binary.as_deref(), Some(&b"data"[..]));
    }

    #[test]
    fn test_empty_field_is_absent() {
        let msg = Message::default().with_field("file_id", "");
        assert_eq!(msg.field_str("file_id"), None);
    }
}
