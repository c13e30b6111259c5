//! Wire types shared between the phonepulse server and its consumers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cookie-carried record of active experiment assignments.
///
/// Serialized as `{"activeVariants": {"<experiment>": "<variant>"}}`. A payload
/// without the `activeVariants` key decodes to an empty mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPayload {
    #[serde(rename = "activeVariants", default)]
    pub active_variants: BTreeMap<String, String>,
}

/// Body accepted by `POST /api/feedback`.
///
/// Every field is optional on the wire; presence of `title` and `email` is
/// checked by the handler so the error body stays under server control.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub feedback_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackReceipt {
    pub id: String,
    pub title: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSubmitted {
    pub success: bool,
    pub message: String,
    pub data: FeedbackReceipt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackList {
    pub success: bool,
    pub entries: Vec<Value>,
    pub count: u64,
    pub total: u64,
}

/// Error body used by the feedback surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
