//! Edge pipeline: cookie read, variant compute, impressions, URL rewrite.
//!
//! Forwarding and response decoration are HTTP concerns and live in
//! `infra::http::edge`; this module produces the decision they act on.

use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use crate::application::personalize::{
    Attributes, PersonalizeEngine, PersonalizeError, PersonalizeSession, RequestState, StateCookie,
};
use crate::domain::manifest::find_cookie;

/// Attribute key under which the budget preference is pushed to the engine.
pub const BUDGET_ATTRIBUTE: &str = "budget";

#[derive(Debug, Clone)]
pub struct EdgeConfig {
    pub variant_query_param: String,
    pub budget_cookie: String,
    pub detach_impressions: bool,
    pub bypass_prefixes: Vec<String>,
}

/// Everything the edge learned about one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeDecision {
    pub variant_param: String,
    pub aliases: Vec<String>,
    pub budget_preference: Option<String>,
    pub state_cookies: Vec<StateCookie>,
}

impl EdgeDecision {
    pub fn is_personalized(&self) -> bool {
        !self.variant_param.is_empty()
    }
}

#[derive(Clone)]
pub struct EdgeService {
    engine: Arc<dyn PersonalizeEngine>,
    config: EdgeConfig,
}

impl EdgeService {
    pub fn new(engine: Arc<dyn PersonalizeEngine>, config: EdgeConfig) -> Self {
        Self { engine, config }
    }

    /// Static assets skip the pipeline entirely.
    pub fn bypasses(&self, path: &str) -> bool {
        self.config
            .bypass_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Compute the decision for a request.
    ///
    /// Engine initialization failure is returned to the caller. Attribute and
    /// impression failures are logged and the decision is still produced.
    pub async fn decide(&self, request: &RequestState) -> Result<EdgeDecision, PersonalizeError> {
        let budget_preference = request
            .cookie_header
            .as_deref()
            .and_then(|header| find_cookie(header, &self.config.budget_cookie))
            .filter(|value| !value.is_empty());

        let mut session = self.engine.init(request).await?;

        // Attributes must land before the variant is read.
        if let Some(budget) = budget_preference.as_ref() {
            let mut attributes = Attributes::new();
            attributes.insert(BUDGET_ATTRIBUTE.to_string(), Value::String(budget.clone()));
            if let Err(err) = session.set(attributes).await {
                warn!(
                    target = "phonepulse::edge",
                    error = %err,
                    "budget preference not applied to personalization session"
                );
            }
        }

        let variant_param = session.variant_param();
        let aliases = session.variant_aliases();
        let state_cookies = session.state_cookies();

        debug!(
            target = "phonepulse::edge",
            variant_param = %variant_param,
            aliases = aliases.len(),
            "variant computed"
        );

        self.fire_impressions(Arc::from(session), aliases.clone())
            .await;

        Ok(EdgeDecision {
            variant_param,
            aliases,
            budget_preference,
            state_cookies,
        })
    }

    /// Set the engine-owned query parameter to the decision, replacing any prior value.
    pub fn rewrite_url(&self, url: &Url, decision: &EdgeDecision) -> Url {
        let param = self.config.variant_query_param.as_str();
        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != param)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        let mut rewritten = url.clone();
        rewritten.set_query(None);
        if !retained.is_empty() || decision.is_personalized() {
            let mut pairs = rewritten.query_pairs_mut();
            for (key, value) in &retained {
                pairs.append_pair(key, value);
            }
            if decision.is_personalized() {
                pairs.append_pair(param, &decision.variant_param);
            }
        }
        rewritten
    }

    async fn fire_impressions(&self, session: Arc<dyn PersonalizeSession>, aliases: Vec<String>) {
        if aliases.is_empty() {
            return;
        }

        if self.config.detach_impressions {
            tokio::spawn(async move {
                report_impressions(session.trigger_impressions(&aliases).await);
            });
        } else {
            report_impressions(session.trigger_impressions(&aliases).await);
        }
    }
}

fn report_impressions(result: Result<(), PersonalizeError>) {
    if let Err(err) = result {
        counter!("phonepulse_edge_impression_failures_total").increment(1);
        error!(
            target = "phonepulse::edge",
            error = %err,
            "impression delivery failed"
        );
    }
}
