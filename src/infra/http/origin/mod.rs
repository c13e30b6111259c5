//! Origin surface: per-route content endpoints and the feedback endpoint.

mod content;
mod feedback;
mod response;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::get,
};

use crate::application::content::ContentService;
use crate::application::feedback::FeedbackService;
use crate::infra::http::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct OriginState {
    pub content: Arc<ContentService>,
    pub feedback: Arc<FeedbackService>,
    /// Engine-owned variant query parameter.
    pub variant_query_param: Arc<str>,
    /// Legacy variant query parameter honored by the fallback chain.
    pub legacy_query_param: Arc<str>,
}

pub fn build_origin_router(state: OriginState) -> Router {
    Router::new()
        .route(
            "/api/feedback",
            get(feedback::list_feedback).post(feedback::submit_feedback),
        )
        .route("/api/{route}", get(content::route_content))
        .route("/api/{route}/{slug}", get(content::route_detail))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn health() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}
