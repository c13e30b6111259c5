//! Personalize Edge API adapter for the personalization engine contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::application::personalize::{
    Attributes, PersonalizeEngine, PersonalizeError, PersonalizeSession, RequestState, StateCookie,
};
use crate::config::PersonalizeSettings;
use crate::domain::manifest::{MANIFEST_COOKIE, Manifest, find_cookie};
use crate::domain::variant::{self, VariantAlias, VariantParam};
use crate::infra::error::InfraError;
use crate::infra::upstream::base_url;

pub const USER_UID_COOKIE: &str = "cs-personalize-user-uid";

const PROJECT_UID_HEADER: &str = "x-project-uid";
const USER_UID_HEADER: &str = "x-cs-personalize-user-uid";
const PAGE_URL_HEADER: &str = "x-page-url";
const USER_UID_MAX_AGE_DAYS: i64 = 365;

#[derive(Debug, Clone, Default, Deserialize)]
struct ManifestResponse {
    #[serde(default)]
    experiences: Vec<Experience>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Experience {
    short_uid: String,
    #[serde(default)]
    active_variant_short_uid: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImpressionEvent {
    #[serde(rename = "type")]
    kind: &'static str,
    experience_short_uid: String,
    variant_short_uid: String,
}

/// Engine backed by the Personalize Edge API.
#[derive(Debug, Clone)]
pub struct EdgePersonalizeEngine {
    client: Client,
    edge_api: Url,
    project_uid: Option<String>,
}

impl EdgePersonalizeEngine {
    pub fn new(client: Client, settings: &PersonalizeSettings) -> Result<Self, InfraError> {
        let edge_api = base_url(&settings.edge_api_url).map_err(|err| {
            InfraError::configuration(format!("invalid personalize.edge_api_url: {err}"))
        })?;
        Ok(Self {
            client,
            edge_api,
            project_uid: settings.project_uid.clone(),
        })
    }
}

#[async_trait]
impl PersonalizeEngine for EdgePersonalizeEngine {
    async fn init(
        &self,
        request: &RequestState,
    ) -> Result<Box<dyn PersonalizeSession>, PersonalizeError> {
        let project_uid = self
            .project_uid
            .clone()
            .filter(|uid| !uid.is_empty())
            .ok_or(PersonalizeError::NotConfigured("personalize.project_uid"))?;

        let user_uid = request
            .cookie_header
            .as_deref()
            .and_then(|header| find_cookie(header, USER_UID_COOKIE))
            .filter(|uid| !uid.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut session = EdgePersonalizeSession {
            client: self.client.clone(),
            edge_api: self.edge_api.clone(),
            project_uid,
            user_uid,
            page_url: request.url.to_string(),
            user_agent: request.user_agent.clone(),
            experiences: Vec::new(),
        };
        session
            .refresh_manifest()
            .await
            .map_err(PersonalizeError::Init)?;

        Ok(Box::new(session))
    }
}

struct EdgePersonalizeSession {
    client: Client,
    edge_api: Url,
    project_uid: String,
    user_uid: String,
    page_url: String,
    user_agent: Option<String>,
    experiences: Vec<Experience>,
}

impl EdgePersonalizeSession {
    fn endpoint(&self, path: &str) -> Result<Url, String> {
        self.edge_api.join(path).map_err(|err| err.to_string())
    }

    fn with_identity(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header(PROJECT_UID_HEADER, &self.project_uid)
            .header(USER_UID_HEADER, &self.user_uid)
            .header(PAGE_URL_HEADER, &self.page_url);
        match self.user_agent.as_deref() {
            Some(agent) => request.header(reqwest::header::USER_AGENT, agent),
            None => request,
        }
    }

    async fn refresh_manifest(&mut self) -> Result<(), String> {
        let url = self.endpoint("manifest")?;
        let response = self
            .with_identity(self.client.get(url))
            .send()
            .await
            .map_err(|err| err.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("manifest request returned {status}"));
        }

        if let Some(uid) = response
            .headers()
            .get(USER_UID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|uid| !uid.is_empty())
        {
            self.user_uid = uid.to_string();
        }

        let manifest: ManifestResponse = response.json().await.map_err(|err| err.to_string())?;
        debug!(
            target = "phonepulse::edge::personalize",
            experiences = manifest.experiences.len(),
            "manifest refreshed"
        );
        self.experiences = manifest.experiences;
        Ok(())
    }

    fn manifest(&self) -> Manifest {
        let active: BTreeMap<String, String> = self
            .experiences
            .iter()
            .filter_map(|experience| {
                experience
                    .active_variant_short_uid
                    .as_ref()
                    .map(|variant| (experience.short_uid.clone(), variant.clone()))
            })
            .collect();
        Manifest::new(active)
    }
}

#[async_trait]
impl PersonalizeSession for EdgePersonalizeSession {
    async fn set(&mut self, attributes: Attributes) -> Result<(), PersonalizeError> {
        let url = self.endpoint("user-attributes").map_err(PersonalizeError::Attributes)?;
        let response = self
            .with_identity(self.client.patch(url))
            .json(&attributes)
            .send()
            .await
            .map_err(|err| PersonalizeError::Attributes(err.to_string()))?;
        if !response.status().is_success() {
            return Err(PersonalizeError::Attributes(format!(
                "user-attributes request returned {}",
                response.status()
            )));
        }

        self.refresh_manifest()
            .await
            .map_err(PersonalizeError::Attributes)
    }

    fn variant_param(&self) -> String {
        self.experiences
            .iter()
            .map(|experience| {
                format!(
                    "{}_{}",
                    experience.short_uid,
                    experience
                        .active_variant_short_uid
                        .as_deref()
                        .unwrap_or("null")
                )
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn variant_aliases(&self) -> Vec<String> {
        VariantParam::parse(&self.variant_param())
            .map(|param| variant::resolve(&param).tokens())
            .unwrap_or_default()
    }

    async fn trigger_impressions(&self, aliases: &[String]) -> Result<(), PersonalizeError> {
        let events: Vec<ImpressionEvent> = aliases
            .iter()
            .filter_map(|alias| VariantAlias::parse(alias))
            .map(|alias| ImpressionEvent {
                kind: "IMPRESSION",
                experience_short_uid: alias.experience,
                variant_short_uid: alias.variant,
            })
            .collect();
        if events.is_empty() {
            return Ok(());
        }

        let url = self.endpoint("events").map_err(PersonalizeError::Impressions)?;
        let response = self
            .with_identity(self.client.post(url))
            .json(&events)
            .send()
            .await
            .map_err(|err| PersonalizeError::Impressions(err.to_string()))?;
        if !response.status().is_success() {
            return Err(PersonalizeError::Impressions(format!(
                "events request returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn state_cookies(&self) -> Vec<StateCookie> {
        vec![
            StateCookie::new(USER_UID_COOKIE, self.user_uid.clone())
                .with_max_age(time::Duration::days(USER_UID_MAX_AGE_DAYS)),
            StateCookie::new(MANIFEST_COOKIE, self.manifest().to_json()),
        ]
    }
}
