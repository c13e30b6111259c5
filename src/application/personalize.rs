//! Contract of the request-scoped personalization engine.
//!
//! A session is created per inbound request and threaded through the edge
//! pipeline explicitly; nothing about it is global.

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

pub type Attributes = Map<String, Value>;

/// Request state the engine may consult when computing a decision.
#[derive(Debug, Clone)]
pub struct RequestState {
    pub url: Url,
    pub cookie_header: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Error)]
pub enum PersonalizeError {
    #[error("personalization engine is not configured: missing {0}")]
    NotConfigured(&'static str),
    #[error("personalization engine initialization failed: {0}")]
    Init(String),
    #[error("failed to set personalization attributes: {0}")]
    Attributes(String),
    #[error("failed to trigger impressions: {0}")]
    Impressions(String),
}

/// A cookie the engine wants the browser to carry on its next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCookie {
    pub name: String,
    pub value: String,
    pub max_age: Option<time::Duration>,
}

impl StateCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
        }
    }

    pub fn with_max_age(mut self, max_age: time::Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// `Set-Cookie` header value with a percent-encoded payload.
    pub fn to_header_value(&self) -> String {
        let mut builder = Cookie::build((self.name.clone(), self.value.clone()))
            .path("/")
            .same_site(SameSite::Lax);
        if let Some(max_age) = self.max_age {
            builder = builder.max_age(max_age);
        }
        builder.build().encoded().to_string()
    }
}

#[async_trait]
pub trait PersonalizeEngine: Send + Sync {
    /// Open a session for one request. Failure here is fatal for the edge pipeline.
    async fn init(
        &self,
        request: &RequestState,
    ) -> Result<Box<dyn PersonalizeSession>, PersonalizeError>;
}

#[async_trait]
pub trait PersonalizeSession: Send + Sync {
    /// Push attributes into the session. Decisions read afterwards reflect them.
    async fn set(&mut self, attributes: Attributes) -> Result<(), PersonalizeError>;

    fn variant_param(&self) -> String;

    fn variant_aliases(&self) -> Vec<String>;

    async fn trigger_impressions(&self, aliases: &[String]) -> Result<(), PersonalizeError>;

    /// Cookies carrying the session state forward to the next request.
    fn state_cookies(&self) -> Vec<StateCookie>;
}
