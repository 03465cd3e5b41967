//! # webnode-nodes
//!
//! Host-facing node surface and the reference Box and Fitbit adapters.
//!
//! A host runtime feeds [`Message`]s into a [`Node`] and receives output,
//! errors and status updates through its [`NodeHost`] implementation. Each
//! adapter wraps an
//! [`AuthenticatedApiClient`](webnode_auth::AuthenticatedApiClient), so token
//! refresh is handled below the node.
//!
//! ## Example
//!
//! ```ignore
//! use webnode_auth::{box_config, AuthenticatedApiClient, CredentialSet};
//! use webnode_nodes::{BoxNode, BoxOperation, Message, Node};
//!
//! let client = AuthenticatedApiClient::from_config(&box_config("id", "secret"), creds);
//! let node = BoxNode::new(client, BoxOperation::ListFolder { folder_id: None });
//!
//! node.on_input(Message::default(), &host).await;
//! ```

#![deny(unsafe_code)]

pub mod box_node;
pub mod fitbit;
pub mod message;
pub mod node;
pub mod status;

// Re-exports
pub use box_node::{BoxNode, BoxOperation, BOX_API_BASE};
pub use fitbit::{FitbitDataType, FitbitNode, FITBIT_API_BASE};
pub use message::Message;
pub use node::{Node, NodeError, NodeHost};
pub use status::{NodeStatus, StatusFill, StatusShape};
