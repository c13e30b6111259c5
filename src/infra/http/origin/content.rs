use axum::{
    Json,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use phonepulse_api_types::ErrorBody;
use url::form_urlencoded;

use crate::application::content::{ContentOutcome, RoutePolicy, policy_for};
use crate::application::error::ErrorReport;
use crate::application::variant::{VariantInputs, resolve_at_face_value, resolve_with_fallback};
use crate::domain::variant::VariantDecision;

use crate::infra::http::{ResponseTrace, cookie_header};

use super::{OriginState, response};

const SOURCE: &str = "infra::http::origin::content";

/// Query values the variant chain reads, owned for the lifetime of the handler.
struct VariantQuery {
    primary: Option<String>,
    legacy: Option<String>,
    cookie_header: Option<String>,
}

impl VariantQuery {
    fn extract(state: &OriginState, query: Option<&str>, headers: &HeaderMap) -> Self {
        let lookup = |name: &str| {
            query.and_then(|raw| {
                form_urlencoded::parse(raw.as_bytes())
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.into_owned())
            })
        };
        Self {
            primary: lookup(&*state.variant_query_param),
            legacy: lookup(&*state.legacy_query_param),
            cookie_header: cookie_header(headers),
        }
    }

    fn decide(&self, policy: &RoutePolicy) -> VariantDecision {
        let inputs = VariantInputs {
            primary: self.primary.as_deref(),
            legacy: self.legacy.as_deref(),
            cookie_header: self.cookie_header.as_deref(),
        };
        let resolved = if policy.manifest_fallback {
            resolve_with_fallback(inputs)
        } else {
            resolve_at_face_value(inputs)
        };
        resolved.decision
    }
}

pub(super) async fn route_content(
    State(state): State<OriginState>,
    Path(route): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let Some(policy) = policy_for(&route) else {
        return unknown_route(&route);
    };

    let decision = VariantQuery::extract(&state, query.as_deref(), &headers).decide(policy);
    let outcome = state.content.fetch(policy, &decision).await;
    render(policy, outcome, &decision, policy.empty_status)
}

pub(super) async fn route_detail(
    State(state): State<OriginState>,
    Path((route, slug)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let Some(policy) = policy_for(&route).filter(|policy| policy.detail_routes) else {
        return unknown_route(&route);
    };

    let decision = VariantQuery::extract(&state, query.as_deref(), &headers).decide(policy);
    let outcome = state.content.fetch_by_slug(policy, &slug, &decision).await;
    render(policy, outcome, &decision, StatusCode::NOT_FOUND)
}

fn render(
    policy: &RoutePolicy,
    outcome: ContentOutcome,
    decision: &VariantDecision,
    empty_status: StatusCode,
) -> Response {
    let requested = ResponseTrace::new(
        policy.key,
        ResponseTrace::personalization(decision.is_personalized()),
    )
    .with_variant(decision.as_str());
    let (mut response, trace) = match outcome {
        ContentOutcome::Entry(fields) => (response::entry(fields, decision), requested),
        ContentOutcome::Collection { entries, count } => (
            response::collection(entries, count, decision),
            requested,
        ),
        ContentOutcome::Empty => (
            response::no_data(empty_status, policy.empty_message, decision),
            requested,
        ),
        ContentOutcome::UpstreamRecovered => {
            (response::recovered(policy.empty_message), unpersonalized(policy))
        }
        ContentOutcome::UpstreamFailed(err) => (
            response::failure(SOURCE, policy.error_message, &err),
            unpersonalized(policy),
        ),
        ContentOutcome::Unexpected(err) => {
            (response::unexpected(SOURCE, &err), unpersonalized(policy))
        }
    };
    trace.attach(&mut response);
    response
}

fn unpersonalized(policy: &RoutePolicy) -> ResponseTrace {
    ResponseTrace::new(policy.key, ResponseTrace::personalization(false))
}

fn unknown_route(route: &str) -> Response {
    let detail = format!("unknown content route `{route}`");
    let mut response = (
        StatusCode::NOT_FOUND,
        Json(ErrorBody::new("Not found").with_message(detail.clone())),
    )
        .into_response();
    ErrorReport::from_message(SOURCE, detail).attach(&mut response);
    response
}
