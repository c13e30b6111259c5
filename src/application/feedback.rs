use std::sync::Arc;

use phonepulse_api_types::FeedbackRequest;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::collaborators::{
    CollaboratorError, ContentManagement, CreatedEntry, EntryListing,
};
use crate::domain::error::DomainError;
use crate::domain::feedback::{FEEDBACK_CONTENT_TYPE, FeedbackSubmission};

pub const DEFAULT_LIST_LIMIT: u32 = 10;
pub const DEFAULT_LIST_SKIP: u32 = 0;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Upstream(#[from] CollaboratorError),
}

/// Stored submission as acknowledged to the visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedFeedback {
    pub id: String,
    pub title: String,
}

#[derive(Clone)]
pub struct FeedbackService {
    management: Arc<dyn ContentManagement>,
}

impl FeedbackService {
    pub fn new(management: Arc<dyn ContentManagement>) -> Self {
        Self { management }
    }

    /// Validate, stamp, and store a submission. Invalid input never reaches the CMS.
    pub async fn submit(
        &self,
        request: FeedbackRequest,
        received_at: OffsetDateTime,
    ) -> Result<AcceptedFeedback, FeedbackError> {
        let submission = FeedbackSubmission::validate(request)?;
        let title = submission.title.clone();

        let CreatedEntry { uid } = self
            .management
            .create_entry(FEEDBACK_CONTENT_TYPE, submission.into_record(received_at))
            .await
            .inspect_err(|err| {
                warn!(
                    target = "phonepulse::origin::feedback",
                    error = %err,
                    "failed to store feedback"
                );
            })?;

        info!(
            target = "phonepulse::origin::feedback",
            entry_uid = %uid,
            "feedback stored"
        );

        Ok(AcceptedFeedback { id: uid, title })
    }

    pub async fn list(
        &self,
        limit: Option<u32>,
        skip: Option<u32>,
    ) -> Result<EntryListing, CollaboratorError> {
        self.management
            .list_entries(
                FEEDBACK_CONTENT_TYPE,
                limit.unwrap_or(DEFAULT_LIST_LIMIT),
                skip.unwrap_or(DEFAULT_LIST_SKIP),
            )
            .await
    }
}
