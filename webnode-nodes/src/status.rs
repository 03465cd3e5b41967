//! Node status indicators shown by the host.

use serde::{Deserialize, Serialize};

/// Indicator colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFill {
    Red,
    Green,
    Yellow,
    Blue,
    Grey,
}

/// Indicator shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusShape {
    Dot,
    Ring,
}

/// Status shown next to a node. An all-empty status clears the indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<StatusFill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<StatusShape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl NodeStatus {
    /// Create a status.
    pub fn new(fill: StatusFill, shape: StatusShape, text: impl Into<String>) -> Self {
        Self {
            fill: Some(fill),
            shape: Some(shape),
            text: Some(text.into()),
        }
    }

    /// A request is in flight.
    pub fn requesting() -> Self {
        Self::new(StatusFill::Blue, StatusShape::Dot, "requesting")
    }

    /// The last request failed.
    pub fn failed(text: impl Into<String>) -> Self {
        Self::new(StatusFill::Red, StatusShape::Ring, text)
    }

    /// Clear the indicator.
    pub fn clear() -> Self {
        Self::default()
    }

    /// Whether this status clears the indicator.
    pub fn is_clear(&self) -> bool {
        self.fill.is_none() && self.shape.is_none() && self.text.is_none()
    }
}
