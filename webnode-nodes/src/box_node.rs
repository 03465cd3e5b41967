//! Box folder listing, file metadata and download.

use crate::message::Message;
use crate::node::{Node, NodeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use webnode_auth::{ApiCall, AuthenticatedApiClient, ResponseBody, DEFAULT_RETRY_BUDGET};

/// Box content API base URL.
pub const BOX_API_BASE: &str = "https://api.box.com/2.0";

/// Box's root folder id.
pub const ROOT_FOLDER_ID: &str = "0";

const DEFAULT_PAGE_SIZE: u32 = 1000;

/// What a [`BoxNode`] does with each message.
///
/// Ids left unset are taken from the message's `folder_id` / `file_id`
/// fields, which also override configured ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum BoxOperation {
    /// List a folder's entries. Defaults to the root folder.
    ListFolder {
        #[serde(default)]
        folder_id: Option<String>,
    },
    /// Fetch a file's metadata.
    FileInfo {
        #[serde(default)]
        file_id: Option<String>,
    },
    /// Download a file's content.
    Download {
        #[serde(default)]
        file_id: Option<String>,
    },
}

/// Node that talks to the Box content API.
#[derive(Debug, Clone)]
pub struct BoxNode {
    client: AuthenticatedApiClient,
    operation: BoxOperation,
    base_url: String,
    page_size: u32,
    retry_budget: u32,
}

impl BoxNode {
    /// Create a node for the given operation.
    pub fn new(client: AuthenticatedApiClient, operation: BoxOperation) -> Self {
        Self {
            client,
            operation,
            base_url: BOX_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    /// Point the node at another API base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the folder listing page size.
    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Set the per-call retry budget.
    #[must_use]
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// The configured operation.
    pub fn operation(&self) -> &BoxOperation {
        &self.operation
    }

    async fn list_folder(&self, folder_id: &str) -> Result<Value, NodeError> {
        let url = format!(
            "{}/folders/{}/items",
            self.base_url,
            urlencoding::encode(folder_id)
        );
        let mut entries = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let call = ApiCall::get(&url)
                .with_query("fields", "id,type,name")
                .with_query("limit", self.page_size.to_string())
                .with_query("offset", offset.to_string());
            let page = self.client.request(&call, self.retry_budget).await?.into_json();

            let page_entries = page
                .get("entries")
                .and_then(Value::as_array)
                .ok_or_else(|| NodeError::Shape("folder listing has no entries".to_string()))?;
            let total = page
                .get("total_count")
                .and_then(Value::as_u64)
                .ok_or_else(|| NodeError::Shape("folder listing has no total_count".to_string()))?;

            for entry in page_entries {
                entries.push(json!({
                    "id": entry.get("id").cloned().unwrap_or(Value::Null),
                    "type": entry.get("type").cloned().unwrap_or(Value::Null),
                    "name": entry.get("name").cloned().unwrap_or(Value::Null),
                }));
            }

            offset += page_entries.len() as u64;
            debug!(folder_id, fetched = offset, total, "Fetched Box folder page");

            if page_entries.is_empty() || offset >= total {
                break;
            }
        }

        Ok(Value::Array(entries))
    }

    async fn file_info(&self, file_id: &str) -> Result<Value, NodeError> {
        let call = ApiCall::get(format!(
            "{}/files/{}",
            self.base_url,
            urlencoding::encode(file_id)
        ));
        Ok(self.client.request(&call, self.retry_budget).await?.into_json())
    }

    async fn download(&self, file_id: &str) -> Result<bytes::Bytes, NodeError> {
        let call = ApiCall::get(format!(
            "{}/files/{}/content",
            self.base_url,
            urlencoding::encode(file_id)
        ))
        .raw();

        match self.client.request(&call, self.retry_budget).await?.body {
            ResponseBody::Bytes(data) => Ok(data),
            ResponseBody::Empty => Ok(bytes::Bytes::new()),
            ResponseBody::Text(text) => Ok(bytes::Bytes::from(text)),
            ResponseBody::Json(value) => Ok(bytes::Bytes::from(value.to_string())),
        }
    }
}

fn resolve_id<'a>(
    msg: &'a Message,
    field: &str,
    configured: &'a Option<String>,
) -> Option<&'a str> {
    msg.field_str(field)
        .or_else(|| configured.as_deref().filter(|s| !s.is_empty()))
}

#[async_trait]
impl Node for BoxNode {
    fn type_name(&self) -> &'static str {
        "box"
    }

    async fn handle(&self, msg: Message) -> Result<Message, NodeError> {
        match &self.operation {
            BoxOperation::ListFolder { folder_id } => {
                let id = resolve_id(&msg, "folder_id", folder_id)
                    .unwrap_or(ROOT_FOLDER_ID)
                    .to_string();
                let entries = self.list_folder(&id).await?;
                Ok(msg.reply(entries))
            }
            BoxOperation::FileInfo { file_id } => {
                let id = resolve_id(&msg, "file_id", file_id)
                    .ok_or_else(|| NodeError::InvalidInput("no file id".to_string()))?
                    .to_string();
                let info = self.file_info(&id).await?;
                Ok(msg.reply(info))
            }
            BoxOperation::Download { file_id } => {
                let id = resolve_id(&msg, "file_id", file_id)
                    .ok_or_else(|| NodeError::InvalidInput("no file id".to_string()))?
                    .to_string();
                let data = self.download(&id).await?;
                Ok(msg.reply_binary(data))
            }
        }
    }
}
