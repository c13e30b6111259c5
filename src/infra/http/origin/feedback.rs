use axum::{
    Json,
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use phonepulse_api_types::{
    ErrorBody, FeedbackList, FeedbackReceipt, FeedbackRequest, FeedbackSubmitted,
};
use time::OffsetDateTime;
use url::form_urlencoded;

use crate::application::error::ErrorReport;
use crate::application::feedback::FeedbackError;
use crate::domain::content::ContentEntry;
use crate::domain::feedback::{FeedbackStatus, REQUIRED_FIELDS_MESSAGE};

use super::OriginState;

const SOURCE: &str = "infra::http::origin::feedback";
const SUBMIT_FAILED: &str = "Failed to submit feedback";
const LIST_FAILED: &str = "Failed to fetch feedback";
const SUBMITTED_MESSAGE: &str = "Feedback submitted successfully";

pub(super) async fn submit_feedback(State(state): State<OriginState>, body: Bytes) -> Response {
    let request: FeedbackRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new(SUBMIT_FAILED).with_message(err.to_string()),
                ErrorReport::from_error(SOURCE, &err),
            );
        }
    };

    match state
        .feedback
        .submit(request, OffsetDateTime::now_utc())
        .await
    {
        Ok(accepted) => Json(FeedbackSubmitted {
            success: true,
            message: SUBMITTED_MESSAGE.to_string(),
            data: FeedbackReceipt {
                id: accepted.id,
                title: accepted.title,
                status: FeedbackStatus::Received.as_str().to_string(),
            },
        })
        .into_response(),
        Err(FeedbackError::Validation(err)) => error_response(
            StatusCode::BAD_REQUEST,
            ErrorBody::new(REQUIRED_FIELDS_MESSAGE),
            ErrorReport::from_error(SOURCE, &err),
        ),
        Err(FeedbackError::Upstream(err)) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new(SUBMIT_FAILED).with_message(err.to_string()),
            ErrorReport::from_error(SOURCE, &err),
        ),
    }
}

pub(super) async fn list_feedback(
    State(state): State<OriginState>,
    RawQuery(query): RawQuery,
) -> Response {
    let (limit, skip) = paging(query.as_deref());

    match state.feedback.list(limit, skip).await {
        Ok(listing) => Json(FeedbackList {
            success: true,
            count: listing.count,
            total: listing.total,
            entries: listing
                .entries
                .into_iter()
                .map(ContentEntry::into_value)
                .collect(),
        })
        .into_response(),
        Err(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new(LIST_FAILED).with_message(err.to_string()),
            ErrorReport::from_error(SOURCE, &err),
        ),
    }
}

/// Unparseable paging values fall back to the service defaults.
fn paging(query: Option<&str>) -> (Option<u32>, Option<u32>) {
    let mut limit = None;
    let mut skip = None;
    if let Some(raw) = query {
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "limit" => limit = value.trim().parse().ok(),
                "skip" => skip = value.trim().parse().ok(),
                _ => {}
            }
        }
    }
    (limit, skip)
}

fn error_response(status: StatusCode, body: ErrorBody, report: ErrorReport) -> Response {
    let mut response = (status, Json(body)).into_response();
    report.attach(&mut response);
    response
}
