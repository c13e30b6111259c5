//! Request ids and the access log shared by the origin and edge routers.

use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const LOG_TARGET: &str = "phonepulse::http::access";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// What a handler decided about a request, recorded on its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTrace {
    /// Content route key, or `edge` for proxied requests.
    pub route: &'static str,
    /// Variant parameter the response was built for.
    pub variant_param: Option<String>,
    /// `personalized`, `unpersonalized`, or `bypass`.
    pub outcome: &'static str,
}

impl ResponseTrace {
    pub fn new(route: &'static str, outcome: &'static str) -> Self {
        Self {
            route,
            variant_param: None,
            outcome,
        }
    }

    pub fn with_variant(mut self, variant_param: Option<&str>) -> Self {
        self.variant_param = variant_param.map(str::to_string);
        self
    }

    pub fn personalization(personalized: bool) -> &'static str {
        if personalized {
            "personalized"
        } else {
            "unpersonalized"
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis();

    let trace = response.extensions().get::<ResponseTrace>().cloned();
    let route = trace.as_ref().map_or("-", |trace| trace.route);
    let outcome = trace.as_ref().map_or("-", |trace| trace.outcome);
    let variant = trace
        .as_ref()
        .and_then(|trace| trace.variant_param.clone())
        .unwrap_or_default();

    if !is_failure(status) {
        debug!(
            target: LOG_TARGET,
            status = status.as_u16(),
            %method,
            %path,
            route,
            outcome,
            variant = %variant,
            elapsed_ms,
            %request_id,
            "request served"
        );
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let source = report.as_ref().map_or("unknown", |report| report.source);
    let chain = report.map(|report| report.chain).unwrap_or_default();
    let detail = chain.first().map_or("no diagnostic available", String::as_str);

    if status.is_server_error() {
        error!(
            target: LOG_TARGET,
            status = status.as_u16(),
            %method,
            %path,
            route,
            outcome,
            variant = %variant,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            %request_id,
            "request failed"
        );
    } else {
        warn!(
            target: LOG_TARGET,
            status = status.as_u16(),
            %method,
            %path,
            route,
            outcome,
            variant = %variant,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            %request_id,
            "request rejected"
        );
    }

    response
}

fn is_failure(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}
