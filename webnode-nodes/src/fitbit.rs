//! Fitbit profile, daily activity and sleep.

use crate::message::Message;
use crate::node::{Node, NodeError};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use webnode_auth::{ApiCall, AuthenticatedApiClient, DEFAULT_RETRY_BUDGET};

/// Fitbit Web API base URL.
pub const FITBIT_API_BASE: &str = "https://api.fitbit.com";

/// Which Fitbit resource a [`FitbitNode`] fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitbitDataType {
    /// The user's profile.
    #[default]
    Profile,
    /// Daily activity summary.
    Activities,
    /// The main sleep record of a day.
    Sleep,
}

/// Node that reads data from the Fitbit Web API.
///
/// Activities and sleep are fetched for the message's `date` field
/// (`YYYY-MM-DD`), or for today when it is absent.
#[derive(Debug, Clone)]
pub struct FitbitNode {
    client: AuthenticatedApiClient,
    data_type: FitbitDataType,
    base_url: String,
    retry_budget: u32,
}

impl FitbitNode {
    /// Create a node fetching the given data type.
    pub fn new(client: AuthenticatedApiClient, data_type: FitbitDataType) -> Self {
        Self {
            client,
            data_type,
            base_url: FITBIT_API_BASE.to_string(),
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    /// Point the node at another API base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-call retry budget.
    #[must_use]
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// The configured data type.
    pub fn data_type(&self) -> FitbitDataType {
        self.data_type
    }

    async fn get(&self, path: &str) -> Result<Value, NodeError> {
        let call = ApiCall::get(format!("{}{}", self.base_url, path));
        Ok(self.client.request(&call, self.retry_budget).await?.into_json())
    }

    async fn profile(&self) -> Result<Value, NodeError> {
        let mut body = self.get("/1/user/-/profile.json").await?;
        body.get_mut("user")
            .map(Value::take)
            .ok_or_else(|| NodeError::Shape("profile response has no user".to_string()))
    }

    async fn activities(&self, date: NaiveDate) -> Result<Value, NodeError> {
        self.get(&format!("/1/user/-/activities/date/{}.json", date))
            .await
    }

    async fn sleep(&self, date: NaiveDate) -> Result<Value, NodeError> {
        let body = self
            .get(&format!("/1.2/user/-/sleep/date/{}.json", date))
            .await?;
        let records = body
            .get("sleep")
            .and_then(Value::as_array)
            .ok_or_else(|| NodeError::Shape("sleep response has no sleep list".to_string()))?;

        debug!(%date, records = records.len(), "Fetched Fitbit sleep log");
        main_sleep(records)
            .cloned()
            .ok_or_else(|| NodeError::NoData("no sleep data".to_string()))
    }
}

/// The record flagged as main sleep, else the first one.
fn main_sleep(records: &[Value]) -> Option<&Value> {
    records
        .iter()
        .find(|r| r.get("isMainSleep").and_then(Value::as_bool) == Some(true))
        .or_else(|| records.first())
}

fn requested_date(msg: &Message) -> Result<NaiveDate, NodeError> {
    match msg.field_str("date") {
        None | Some("today") => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| NodeError::InvalidInput(format!("invalid date '{}'", s))),
    }
}

#[async_trait]
impl Node for FitbitNode {
    fn type_name(&self) -> &'static str {
        "fitbit"
    }

    async fn handle(&self, msg: Message) -> Result<Message, NodeError> {
        let payload = match self.data_type {
            FitbitDataType::Profile => self.profile().await?,
            FitbitDataType::Activities => self.activities(requested_date(&msg)?).await?,
            FitbitDataType::Sleep => self.sleep(requested_date(&msg)?).await?,
        };
        Ok(msg.reply(payload))
    }
}
