//! Contact-form feedback submissions.

use phonepulse_api_types::FeedbackRequest;
use serde_json::{Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use super::content::ContentFields;
use super::error::DomainError;

pub const FEEDBACK_CONTENT_TYPE: &str = "feedback";
pub const FEEDBACK_SOURCE: &str = "contact_form";
pub const REQUIRED_FIELDS_MESSAGE: &str = "Title and email are required";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackStatus {
    New,
    Received,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::New => "new",
            FeedbackStatus::Received => "received",
        }
    }
}

/// A submission whose required fields have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackSubmission {
    pub title: String,
    pub email: String,
    pub message: Option<String>,
    pub feedback_type: Option<String>,
}

impl FeedbackSubmission {
    /// Reject requests whose `title` or `email` is missing or empty.
    pub fn validate(request: FeedbackRequest) -> Result<Self, DomainError> {
        let FeedbackRequest {
            title,
            email,
            message,
            feedback_type,
        } = request;

        match (non_empty(title), non_empty(email)) {
            (Some(title), Some(email)) => Ok(Self {
                title,
                email,
                message,
                feedback_type,
            }),
            _ => Err(DomainError::validation(REQUIRED_FIELDS_MESSAGE)),
        }
    }

    /// Fields stored in the CMS, stamped with server-assigned metadata.
    pub fn into_record(self, received_at: OffsetDateTime) -> ContentFields {
        let created_at = received_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| received_at.unix_timestamp().to_string());

        let mut fields = ContentFields::new();
        fields.insert("title".to_string(), Value::String(self.title));
        fields.insert("email".to_string(), Value::String(self.email));
        fields.insert("message".to_string(), json!(self.message));
        fields.insert("feedback_type".to_string(), json!(self.feedback_type));
        fields.insert(
            "status".to_string(),
            Value::String(FeedbackStatus::New.as_str().to_string()),
        );
        fields.insert("created_at".to_string(), Value::String(created_at));
        fields.insert(
            "source".to_string(),
            Value::String(FEEDBACK_SOURCE.to_string()),
        );
        fields
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}
