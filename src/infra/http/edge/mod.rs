//! Edge surface: intercepts every request and forwards it to the origin.

mod proxy;

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware};
use reqwest::Client;
use url::Url;

use crate::application::edge::EdgeService;
use crate::infra::http::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct EdgeState {
    pub edge: Arc<EdgeService>,
    pub client: Client,
    /// Base URL of the origin; request paths and queries are applied to it.
    pub origin: Url,
    pub max_body_bytes: usize,
}

pub fn build_edge_router(state: EdgeState) -> Router {
    Router::new()
        .fallback(proxy::intercept)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
