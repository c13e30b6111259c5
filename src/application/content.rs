//! Content routes: the per-route policy table and the fetch service behind it.

use std::sync::Arc;

use axum::http::StatusCode;
use metrics::counter;
use tracing::{debug, warn};

use crate::application::collaborators::{CollaboratorError, ContentDelivery};
use crate::domain::content::{ContentEntry, ContentFields};
use crate::domain::error::DomainError;
use crate::domain::variant::VariantDecision;

/// What a successful response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentShape {
    /// The first entry's fields merged with personalization metadata.
    FirstEntry,
    /// Every entry, plus a count.
    Collection,
}

/// How a failing content delivery call is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorPolicy {
    /// Answer with the no-data body and status 200.
    RecoverAsEmpty,
    /// Answer 500 with the route's error message.
    Surface,
}

/// Declared behavior of one content route.
///
/// The routes deliberately disagree on empty and error handling; the table keeps
/// those differences in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolicy {
    pub key: &'static str,
    pub content_type: &'static str,
    pub shape: ContentShape,
    pub manifest_fallback: bool,
    pub empty_status: StatusCode,
    pub on_upstream_error: UpstreamErrorPolicy,
    pub empty_message: &'static str,
    pub error_message: &'static str,
    pub detail_routes: bool,
}

const fn page(
    key: &'static str,
    content_type: &'static str,
    empty_message: &'static str,
    error_message: &'static str,
) -> RoutePolicy {
    RoutePolicy {
        key,
        content_type,
        shape: ContentShape::FirstEntry,
        manifest_fallback: false,
        empty_status: StatusCode::OK,
        on_upstream_error: UpstreamErrorPolicy::RecoverAsEmpty,
        empty_message,
        error_message,
        detail_routes: false,
    }
}

const fn collection(
    key: &'static str,
    content_type: &'static str,
    empty_message: &'static str,
    error_message: &'static str,
) -> RoutePolicy {
    RoutePolicy {
        key,
        content_type,
        shape: ContentShape::Collection,
        manifest_fallback: false,
        empty_status: StatusCode::OK,
        on_upstream_error: UpstreamErrorPolicy::Surface,
        empty_message,
        error_message,
        detail_routes: true,
    }
}

pub const ROUTE_POLICIES: &[RoutePolicy] = &[
    RoutePolicy {
        key: "home",
        content_type: "home_page",
        shape: ContentShape::FirstEntry,
        manifest_fallback: true,
        empty_status: StatusCode::NOT_FOUND,
        on_upstream_error: UpstreamErrorPolicy::Surface,
        empty_message: "No home page data found",
        error_message: "Home page API error",
        detail_routes: false,
    },
    page("header", "header", "No header data found", "Header API error"),
    page("footer", "footer", "No footer data found", "Footer API error"),
    page(
        "about",
        "about_page",
        "No about page data found",
        "About page API error",
    ),
    page(
        "careers",
        "careers_page",
        "No careers page data found",
        "Careers page API error",
    ),
    page(
        "contact",
        "contact_page",
        "No contact page data found",
        "Contact page API error",
    ),
    page(
        "faqs",
        "faq_page",
        "No faqs page data found",
        "FAQs page API error",
    ),
    collection("phones", "phone", "No phones data found", "Phones API error"),
    collection("news", "news_article", "No news data found", "News API error"),
    collection(
        "reviews",
        "review",
        "No reviews data found",
        "Reviews API error",
    ),
    collection(
        "companies",
        "company",
        "No companies data found",
        "Companies API error",
    ),
];

pub fn policy_for(key: &str) -> Option<&'static RoutePolicy> {
    ROUTE_POLICIES.iter().find(|policy| policy.key == key)
}

/// Result of fetching content for one route.
#[derive(Debug)]
pub enum ContentOutcome {
    Entry(ContentFields),
    Collection {
        entries: Vec<ContentEntry>,
        count: u64,
    },
    Empty,
    /// Upstream failed and the route answers as if empty.
    UpstreamRecovered,
    UpstreamFailed(CollaboratorError),
    Unexpected(DomainError),
}

#[derive(Clone)]
pub struct ContentService {
    delivery: Arc<dyn ContentDelivery>,
}

impl ContentService {
    pub fn new(delivery: Arc<dyn ContentDelivery>) -> Self {
        Self { delivery }
    }

    pub async fn fetch(&self, policy: &RoutePolicy, decision: &VariantDecision) -> ContentOutcome {
        debug!(
            target = "phonepulse::origin::content",
            route = policy.key,
            content_type = policy.content_type,
            variant = decision.as_str().unwrap_or(""),
            "fetching entries"
        );

        let collection = match self
            .delivery
            .get_all_entries(policy.content_type, decision.variant_param())
            .await
        {
            Ok(collection) => collection,
            Err(err) => return upstream_failure(policy, err),
        };

        if collection.is_empty() {
            return ContentOutcome::Empty;
        }

        match policy.shape {
            ContentShape::FirstEntry => first_entry(collection.entries),
            ContentShape::Collection => ContentOutcome::Collection {
                count: collection.count,
                entries: collection.entries,
            },
        }
    }

    pub async fn fetch_by_slug(
        &self,
        policy: &RoutePolicy,
        slug: &str,
        decision: &VariantDecision,
    ) -> ContentOutcome {
        match self
            .delivery
            .get_entry_by_slug(policy.content_type, slug, decision.variant_param())
            .await
        {
            Ok(Some(entry)) => match entry.into_fields() {
                Ok(fields) => ContentOutcome::Entry(fields),
                Err(err) => ContentOutcome::Unexpected(err),
            },
            Ok(None) => ContentOutcome::Empty,
            Err(err) => upstream_failure(policy, err),
        }
    }
}

fn first_entry(entries: Vec<ContentEntry>) -> ContentOutcome {
    match entries.into_iter().next().map(ContentEntry::into_fields) {
        Some(Ok(fields)) => ContentOutcome::Entry(fields),
        Some(Err(err)) => ContentOutcome::Unexpected(err),
        None => ContentOutcome::Empty,
    }
}

fn upstream_failure(policy: &RoutePolicy, err: CollaboratorError) -> ContentOutcome {
    warn!(
        target = "phonepulse::origin::content",
        route = policy.key,
        content_type = policy.content_type,
        error = %err,
        "content delivery failed"
    );
    counter!(
        "phonepulse_origin_upstream_failures_total",
        "content_type" => policy.content_type
    )
    .increment(1);

    match policy.on_upstream_error {
        UpstreamErrorPolicy::RecoverAsEmpty => ContentOutcome::UpstreamRecovered,
        UpstreamErrorPolicy::Surface => ContentOutcome::UpstreamFailed(err),
    }
}
