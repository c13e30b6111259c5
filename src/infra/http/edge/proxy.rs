use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::{
        HeaderMap, HeaderName, HeaderValue, Request,
        header::{self, CACHE_CONTROL, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use metrics::counter;
use tracing::{debug, warn};
use url::Url;

use crate::application::edge::EdgeDecision;
use crate::application::error::ProxyError;
use crate::application::personalize::RequestState;
use crate::infra::http::{ResponseTrace, cookie_header};

use super::EdgeState;

const SOURCE: &str = "infra::http::edge::proxy";
const TRACE_ROUTE: &str = "edge";
const BUDGET_HEADER: &str = "x-budget-preference";
const BUDGET_NONE: &str = "none";

/// Connection-scoped headers plus the ones reqwest and hyper recompute.
const NOT_FORWARDED: [&str; 10] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

pub(super) async fn intercept(State(state): State<EdgeState>, request: Request<Body>) -> Response {
    let target = origin_target(&state.origin, &request);

    if state.edge.bypasses(request.uri().path()) {
        counter!("phonepulse_edge_requests_total", "outcome" => "bypass").increment(1);
        let mut response = match forward(&state, request, target).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        };
        ResponseTrace::new(TRACE_ROUTE, "bypass").attach(&mut response);
        return response;
    }

    let request_state = RequestState {
        url: public_url(&request).unwrap_or_else(|| target.clone()),
        cookie_header: cookie_header(request.headers()),
        user_agent: header_string(request.headers(), header::USER_AGENT),
    };

    let decision = match state.edge.decide(&request_state).await {
        Ok(decision) => decision,
        Err(err) => {
            return ProxyError::bad_gateway(SOURCE, "Personalization unavailable", &err)
                .into_response();
        }
    };

    let outcome = ResponseTrace::personalization(decision.is_personalized());
    counter!("phonepulse_edge_requests_total", "outcome" => outcome).increment(1);

    let rewritten = state.edge.rewrite_url(&target, &decision);
    debug!(
        target = "phonepulse::edge",
        forward_to = %rewritten,
        "forwarding personalized request"
    );

    let mut response = match forward(&state, request, rewritten).await {
        Ok(response) => decorate(response, &decision),
        Err(err) => err.into_response(),
    };
    ResponseTrace::new(TRACE_ROUTE, outcome)
        .with_variant(Some(decision.variant_param.as_str()).filter(|param| !param.is_empty()))
        .attach(&mut response);
    response
}

/// The origin URL carrying the request's path and query.
fn origin_target(origin: &Url, request: &Request<Body>) -> Url {
    let mut target = origin.clone();
    target.set_path(request.uri().path());
    target.set_query(request.uri().query());
    target
}

/// URL as the visitor addressed it, when the Host header allows reconstructing it.
fn public_url(request: &Request<Body>) -> Option<Url> {
    let host = header_string(request.headers(), header::HOST)?;
    let path_and_query = request
        .uri()
        .path_and_query()
        .map_or("/", |value| value.as_str());
    Url::parse(&format!("http://{host}{path_and_query}")).ok()
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn is_forwardable(name: &HeaderName) -> bool {
    !NOT_FORWARDED.contains(&name.as_str())
}

async fn forward(
    state: &EdgeState,
    request: Request<Body>,
    target: Url,
) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|err| ProxyError::body_too_large(SOURCE, &err))?;

    let mut headers = HeaderMap::new();
    for (name, value) in parts.headers.iter().filter(|(name, _)| is_forwardable(name)) {
        headers.append(name.clone(), value.clone());
    }

    let upstream = state
        .client
        .request(parts.method, target)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|err| ProxyError::bad_gateway(SOURCE, "Origin unavailable", &err))?;

    let mut response = Response::builder().status(upstream.status());
    if let Some(headers) = response.headers_mut() {
        for (name, value) in upstream
            .headers()
            .iter()
            .filter(|(name, _)| is_forwardable(name))
        {
            headers.append(name.clone(), value.clone());
        }
    }

    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|err| ProxyError::bad_gateway(SOURCE, "Origin response invalid", &err))
}

/// Attach fresh state cookies, forbid caching, and echo the budget preference.
fn decorate(mut response: Response, decision: &EdgeDecision) -> Response {
    let headers = response.headers_mut();

    for cookie in &decision.state_cookies {
        match HeaderValue::from_str(&cookie.to_header_value()) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(err) => warn!(
                target = "phonepulse::edge",
                cookie = %cookie.name,
                error = %err,
                "state cookie dropped"
            ),
        }
    }

    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    let budget = decision
        .budget_preference
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or_else(|| HeaderValue::from_static(BUDGET_NONE));
    headers.insert(HeaderName::from_static(BUDGET_HEADER), budget);

    response
}
