mod support;

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use phonepulse::application::content::ContentService;
use phonepulse::application::feedback::FeedbackService;
use phonepulse::infra::http::{OriginState, ResponseTrace, build_origin_router};

use support::{FakeDelivery, FakeManagement};

fn origin(delivery: Arc<FakeDelivery>, management: Arc<FakeManagement>) -> Router {
    build_origin_router(OriginState {
        content: Arc::new(ContentService::new(delivery)),
        feedback: Arc::new(FeedbackService::new(management)),
        variant_query_param: Arc::from("cs_personalize"),
        legacy_query_param: Arc::from("cs_variant"),
    })
}

fn content_origin(delivery: Arc<FakeDelivery>) -> Router {
    origin(delivery, Arc::new(FakeManagement::default()))
}

async fn get(router: Router, uri: &str, cookie: Option<&str>) -> (StatusCode, Value) {
    get_with_cookies(router, uri, cookie.as_slice()).await
}

/// Each cookie string goes out as its own `Cookie` header.
async fn get_with_cookies(router: Router, uri: &str, cookies: &[&str]) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    for cookie in cookies {
        request = request.header(header::COOKIE, *cookie);
    }
    let response = router
        .oneshot(request.body(Body::empty()).expect("request"))
        .await
        .expect("response");
    read(response).await
}

async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    let response = router.oneshot(request).await.expect("response");
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn home_entry() -> Value {
    json!({ "uid": "blt_home", "title": "Find your next phone" })
}

#[tokio::test]
async fn home_without_variant_is_unpersonalized() {
    let delivery = Arc::new(FakeDelivery::with_entries(vec![home_entry()]));

    let (status, body) = get(content_origin(delivery.clone()), "/api/home", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Find your next phone");
    assert_eq!(body["personalized"], false);
    assert_eq!(body["variantParam"], Value::Null);
    assert_eq!(delivery.calls(), vec![("home_page".to_string(), None)]);
}

#[tokio::test]
async fn home_passes_query_variant_to_delivery() {
    let delivery = Arc::new(FakeDelivery::with_entries(vec![home_entry()]));

    let (status, body) = get(
        content_origin(delivery.clone()),
        "/api/home?cs_personalize=exp_123_var_456",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["personalized"], true);
    assert_eq!(body["variantParam"], "exp_123_var_456");
    assert_eq!(
        delivery.calls(),
        vec![("home_page".to_string(), Some("exp_123_var_456".to_string()))]
    );
}

#[tokio::test]
async fn empty_manifest_keeps_degenerate_legacy_variant() {
    let delivery = Arc::new(FakeDelivery::with_entries(vec![home_entry()]));
    let cookie = "cs-personalize-manifest=%7B%22activeVariants%22%3A%7B%7D%7D";

    let (status, body) = get(
        content_origin(delivery.clone()),
        "/api/home?cs_variant=0_null",
        Some(cookie),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["personalized"], true);
    assert_eq!(body["variantParam"], "0_null");
    assert_eq!(
        delivery.calls(),
        vec![("home_page".to_string(), Some("0_null".to_string()))]
    );
}

#[tokio::test]
async fn home_recovers_variant_from_manifest_cookie() {
    let delivery = Arc::new(FakeDelivery::with_entries(vec![home_entry()]));
    let cookie = "theme=dark; cs-personalize-manifest=%7B%22activeVariants%22%3A%7B%221%22%3A%222%22%7D%7D";

    let (_, body) = get(content_origin(delivery.clone()), "/api/home", Some(cookie)).await;

    assert_eq!(body["variantParam"], "1_2");
    assert_eq!(body["personalized"], true);
}

#[tokio::test]
async fn manifest_cookie_in_a_later_cookie_header_is_recovered() {
    let delivery = Arc::new(FakeDelivery::with_entries(vec![home_entry()]));
    let manifest =
        "cs-personalize-manifest=%7B%22activeVariants%22%3A%7B%22exp_123%22%3A%22var_456%22%7D%7D";

    let (status, body) = get_with_cookies(
        content_origin(delivery.clone()),
        "/api/home?cs_personalize=0_null",
        &["theme=dark", manifest],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["variantParam"], "exp_123_var_456");
    assert_eq!(
        delivery.calls(),
        vec![("home_page".to_string(), Some("exp_123_var_456".to_string()))]
    );
}

#[tokio::test]
async fn content_responses_carry_a_trace() {
    let delivery = Arc::new(FakeDelivery::with_entries(vec![home_entry()]));
    let request = Request::builder()
        .uri("/api/home?cs_personalize=1_2")
        .body(Body::empty())
        .expect("request");

    let response = content_origin(delivery)
        .oneshot(request)
        .await
        .expect("response");

    let trace = response
        .extensions()
        .get::<ResponseTrace>()
        .expect("trace attached");
    assert_eq!(trace.route, "home");
    assert_eq!(trace.outcome, "personalized");
    assert_eq!(trace.variant_param.as_deref(), Some("1_2"));
}

#[tokio::test]
async fn malformed_manifest_cookie_resolves_unpersonalized() {
    let delivery = Arc::new(FakeDelivery::with_entries(vec![home_entry()]));

    let (status, body) = get(
        content_origin(delivery.clone()),
        "/api/home",
        Some("cs-personalize-manifest=not-json"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["personalized"], false);
    assert_eq!(body["variantParam"], Value::Null);
}

#[tokio::test]
async fn static_pages_ignore_manifest_cookie() {
    let delivery = Arc::new(FakeDelivery::with_entries(vec![json!({ "title": "Careers" })]));
    let cookie = "cs-personalize-manifest=%7B%22activeVariants%22%3A%7B%221%22%3A%222%22%7D%7D";

    let (_, body) = get(content_origin(delivery.clone()), "/api/careers", Some(cookie)).await;

    assert_eq!(body["personalized"], false);
    assert_eq!(delivery.calls(), vec![("careers_page".to_string(), None)]);
}

#[tokio::test]
async fn empty_home_is_not_found_but_empty_page_is_ok() {
    let (status, body) = get(
        content_origin(Arc::new(FakeDelivery::default())),
        "/api/home?cs_personalize=1_2",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No home page data found");
    assert_eq!(body["personalized"], true);
    assert_eq!(body["variantParam"], "1_2");
    assert!(body["timestamp"].is_string());

    let (status, body) = get(
        content_origin(Arc::new(FakeDelivery::default())),
        "/api/about",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No about page data found");
}

#[tokio::test]
async fn static_pages_recover_from_upstream_failure() {
    for (route, message) in [
        ("careers", "No careers page data found"),
        ("contact", "No contact page data found"),
        ("faqs", "No faqs page data found"),
        ("about", "No about page data found"),
    ] {
        let (status, body) = get(
            content_origin(Arc::new(FakeDelivery::failing())),
            &format!("/api/{route}?cs_personalize=1_2"),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK, "route {route}");
        assert_eq!(body["message"], message);
        assert_eq!(body["personalized"], false);
        assert_eq!(body["variantParam"], Value::Null);
    }
}

#[tokio::test]
async fn home_surfaces_upstream_failure() {
    let (status, body) = get(
        content_origin(Arc::new(FakeDelivery::failing())),
        "/api/home",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Home page API error");
    assert!(
        body["error"]
            .as_str()
            .is_some_and(|error| error.contains("upstream unavailable"))
    );
    assert_eq!(body["personalized"], false);
}

#[tokio::test]
async fn non_object_entry_is_an_internal_error() {
    let delivery = Arc::new(FakeDelivery::with_entries(vec![json!("just a string")]));

    let (status, body) = get(content_origin(delivery), "/api/header", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");
}

#[tokio::test]
async fn collection_routes_return_every_entry() {
    let delivery = Arc::new(FakeDelivery::with_entries(vec![
        json!({ "title": "Pixel 9", "slug": "pixel-9" }),
        json!({ "title": "Galaxy S25", "slug": "galaxy-s25" }),
    ]));

    let (status, body) = get(
        content_origin(delivery.clone()),
        "/api/phones?cs_personalize=1_2",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["entries"][1]["title"], "Galaxy S25");
    assert_eq!(body["variantParam"], "1_2");
    assert_eq!(
        delivery.calls(),
        vec![("phone".to_string(), Some("1_2".to_string()))]
    );
}

#[tokio::test]
async fn collection_routes_surface_upstream_failure() {
    let (status, body) = get(
        content_origin(Arc::new(FakeDelivery::failing())),
        "/api/reviews",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Reviews API error");
}

#[tokio::test]
async fn detail_route_finds_entry_by_slug() {
    let delivery = Arc::new(FakeDelivery::with_entries(vec![
        json!({ "title": "Pixel 9", "slug": "pixel-9" }),
    ]));

    let (status, body) = get(content_origin(delivery.clone()), "/api/phones/pixel-9", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Pixel 9");
    assert_eq!(body["personalized"], false);

    let (status, body) = get(content_origin(delivery), "/api/phones/iphone-1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No phones data found");
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let delivery = Arc::new(FakeDelivery::default());

    let (status, _) = get(content_origin(delivery.clone()), "/api/laptops", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(content_origin(delivery.clone()), "/api/home/anything", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert!(delivery.calls().is_empty());
}

#[tokio::test]
async fn feedback_without_email_is_rejected_before_storage() {
    let management = Arc::new(FakeManagement::default());
    let router = origin(Arc::new(FakeDelivery::default()), management.clone());

    let (status, body) = post_json(
        router,
        "/api/feedback",
        json!({ "title": "Battery review", "message": "Please cover standby drain" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Title and email are required" }));
    assert!(management.created().is_empty());
}

#[tokio::test]
async fn feedback_is_stored_with_server_fields() {
    let management = Arc::new(FakeManagement::default());
    let router = origin(Arc::new(FakeDelivery::default()), management.clone());

    let (status, body) = post_json(
        router,
        "/api/feedback",
        json!({
            "title": "Battery review",
            "email": "reader@example.com",
            "message": "Please cover standby drain",
            "feedback_type": "suggestion"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Feedback submitted successfully");
    assert_eq!(body["data"]["id"], "blt1");
    assert_eq!(body["data"]["title"], "Battery review");
    assert_eq!(body["data"]["status"], "received");

    let created = management.created();
    assert_eq!(created.len(), 1);
    let (content_type, fields) = &created[0];
    assert_eq!(content_type, "feedback");
    assert_eq!(fields["status"], "new");
    assert_eq!(fields["source"], "contact_form");
    assert!(fields["created_at"].is_string());
}

#[tokio::test]
async fn feedback_upstream_failure_is_reported() {
    let router = origin(
        Arc::new(FakeDelivery::default()),
        Arc::new(FakeManagement::failing()),
    );

    let (status, body) = post_json(
        router,
        "/api/feedback",
        json!({ "title": "Battery review", "email": "reader@example.com" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to submit feedback");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn feedback_listing_pages_through_entries() {
    let management = Arc::new(FakeManagement::default());
    for title in ["one", "two", "three"] {
        let router = origin(Arc::new(FakeDelivery::default()), management.clone());
        let (status, _) = post_json(
            router,
            "/api/feedback",
            json!({ "title": title, "email": "reader@example.com" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let router = origin(Arc::new(FakeDelivery::default()), management);
    let (status, body) = get(router, "/api/feedback?limit=2&skip=1", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    assert_eq!(body["total"], 3);
    assert_eq!(body["entries"][0]["title"], "two");
}

#[tokio::test]
async fn health_endpoint_reports_no_content() {
    let (status, body) = get(
        content_origin(Arc::new(FakeDelivery::default())),
        "/healthz",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}
