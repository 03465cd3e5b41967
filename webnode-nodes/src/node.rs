//! The node surface the host runtime drives.

use crate::message::Message;
use crate::status::NodeStatus;
use async_trait::async_trait;
use tracing::warn;
use webnode_auth::ApiError;

/// Errors raised while handling a message.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Authentication or request failure.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The message or node configuration is unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The service answered with an unexpected document.
    #[error("Unexpected response: {0}")]
    Shape(String),
    /// The service has nothing for the requested item.
    #[error("{0}")]
    NoData(String),
}

impl NodeError {
    /// Short text for the node's failure status.
    pub fn status_text(&self) -> String {
        match self {
            Self::Api(ApiError::Api { status, .. }) => format!("failed (HTTP {})", status),
            Self::Api(e) => e.kind().to_string(),
            Self::InvalidInput(_) => "invalid input".to_string(),
            Self::Shape(_) => "unexpected response".to_string(),
            Self::NoData(msg) => msg.clone(),
        }
    }

    /// Whether the user has to authorize the node again.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(self, Self::Api(e) if e.requires_reauthorization())
    }
}

/// Callbacks into the host runtime.
pub trait NodeHost: Send + Sync {
    /// Emit a message on the node's output.
    fn send(&self, msg: Message);

    /// Report an error for the message that caused it.
    fn error(&self, err: &NodeError, msg: &Message);

    /// Update the node's status indicator.
    fn status(&self, status: NodeStatus);
}

/// A node that turns an input message into one output message.
#[async_trait]
pub trait Node: Send + Sync {
    /// Type name registered with the host.
    fn type_name(&self) -> &'static str;

    /// Handle one message.
    async fn handle(&self, msg: Message) -> Result<Message, NodeError>;

    /// Drive one input through [`handle`](Node::handle), reporting status,
    /// output and errors to the host.
    async fn on_input(&self, msg: Message, host: &dyn NodeHost) {
        host.status(NodeStatus::requesting());
        let input = msg.clone();

        match self.handle(msg).await {
            Ok(out) => {
                host.status(NodeStatus::clear());
                host.send(out);
            }
            Err(e) => {
                warn!(node = self.type_name(), msg_id = %input.id, error = %e, "Node failed");
                host.status(NodeStatus::failed(e.status_text()));
                host.error(&e, &input);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingHost;
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Node for Echo {
        fn type_name(&self) -> &'static str {
            "echo"
        }

        async fn handle(&self, msg: Message) -> Result<Message, NodeError> {
            match msg.field_str("fail") {
                Some(reason) => Err(NodeError::InvalidInput(reason.to_string())),
                None => Ok(msg.reply(json!("ok"))),
            }
        }
    }

    #[tokio::test]
    async fn test_on_input_success() {
        let host = RecordingHost::default();
        Echo.on_input(Message::new("in").with_id("m1"), &host).await;

        assert_eq!(host.sent.lock().len(), 1);
        assert_eq!(host.sent.lock()[0].payload, json!("ok"));
        assert!(host.errors.lock().is_empty());
        assert_eq!(
            *host.statuses.lock(),
            vec![NodeStatus::requesting(), NodeStatus::clear()]
        );
    }

    #[tokio::test]
    async fn test_on_input_failure() {
        let host = RecordingHost::default();
        let msg = Message::new("in").with_id("m2").with_field("fail", "no id");
        Echo.on_input(msg, &host).await;

        assert!(host.sent.lock().is_empty());
        assert_eq!(
            *host.errors.lock(),
            vec![("Invalid input: no id".to_string(), "m2".to_string())]
        );
        assert_eq!(
            host.statuses.lock().last(),
            Some(&NodeStatus::failed("invalid input"))
        );
    }

    #[rstest]
    #[case(NodeError::Api(ApiError::RetryBudgetExhausted { status: Some(401) }), "retry_budget_exhausted")]
    #[case(NodeError::Api(ApiError::api(404, None)), "failed (HTTP 404)")]
    #[case(NodeError::NoData("no sleep data".into()), "no sleep data")]
    #[case(NodeError::Shape("x".into()), "unexpected response")]
    fn test_status_text(#[case] err: NodeError, #[case] expected: &str) {
        assert_eq!(err.status_text(), expected);
    }

    #[test]
    fn test_reauthorization() {
        assert!(NodeError::Api(ApiError::NoRefreshToken).requires_reauthorization());
        assert!(!NodeError::Shape("x".into()).requires_reauthorization());
    }
}
