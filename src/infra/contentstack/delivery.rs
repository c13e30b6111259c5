use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::json;
use url::Url;

use crate::application::collaborators::{CollaboratorError, ContentDelivery};
use crate::config::ContentstackSettings;
use crate::domain::content::{ContentEntry, EntryCollection};
use crate::domain::variant::{self, VariantParam};
use crate::infra::error::InfraError;
use crate::infra::upstream::{base_url, read_json};

use super::{API_KEY_HEADER, EntriesResponse, entries_path};

const SERVICE: &str = "content delivery";
const ACCESS_TOKEN_HEADER: &str = "access_token";
const BRANCH_HEADER: &str = "branch";
const VARIANT_HEADER: &str = "x-cs-variant-uid";

/// Content Delivery API client.
#[derive(Debug, Clone)]
pub struct ContentstackDelivery {
    client: Client,
    base: Url,
    api_key: Option<String>,
    delivery_token: Option<String>,
    environment: Option<String>,
    branch: Option<String>,
}

impl ContentstackDelivery {
    pub fn new(client: Client, settings: &ContentstackSettings) -> Result<Self, InfraError> {
        let base = base_url(&settings.delivery_host).map_err(|err| {
            InfraError::configuration(format!("invalid contentstack.delivery_host: {err}"))
        })?;
        Ok(Self {
            client,
            base,
            api_key: settings.api_key.clone(),
            delivery_token: settings.delivery_token.clone(),
            environment: settings.environment.clone(),
            branch: settings.branch.clone(),
        })
    }

    fn request(
        &self,
        content_type: &str,
        extra_query: &[(&str, String)],
        variant: Option<&VariantParam>,
    ) -> Result<RequestBuilder, CollaboratorError> {
        let api_key = required(self.api_key.as_deref(), "contentstack.api_key")?;
        let token = required(self.delivery_token.as_deref(), "contentstack.delivery_token")?;
        let environment = required(self.environment.as_deref(), "contentstack.environment")?;

        let mut url = self
            .base
            .join(&entries_path(content_type))
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("environment", environment);
            pairs.append_pair("include_count", "true");
            for (key, value) in extra_query {
                pairs.append_pair(key, value);
            }
        }

        let mut request = self
            .client
            .get(url)
            .header(API_KEY_HEADER, api_key)
            .header(ACCESS_TOKEN_HEADER, token);
        if let Some(branch) = self.branch.as_deref() {
            request = request.header(BRANCH_HEADER, branch);
        }
        if let Some(aliases) = variant.and_then(|param| variant::resolve(param).to_query_value()) {
            request = request.header(VARIANT_HEADER, aliases);
        }
        Ok(request)
    }

    async fn send(&self, request: RequestBuilder) -> Result<EntriesResponse, CollaboratorError> {
        let response = request
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;
        read_json(SERVICE, response).await
    }
}

#[async_trait]
impl ContentDelivery for ContentstackDelivery {
    async fn get_all_entries(
        &self,
        content_type: &str,
        variant: Option<&VariantParam>,
    ) -> Result<EntryCollection, CollaboratorError> {
        let request = self.request(content_type, &[], variant)?;
        let body = self.send(request).await?;
        let entries: Vec<ContentEntry> = body.entries.into_iter().map(ContentEntry::new).collect();
        let count = body.count.unwrap_or(entries.len() as u64);
        Ok(EntryCollection { entries, count })
    }

    async fn get_entry_by_slug(
        &self,
        content_type: &str,
        slug: &str,
        variant: Option<&VariantParam>,
    ) -> Result<Option<ContentEntry>, CollaboratorError> {
        let query = [
            ("query", json!({ "slug": slug }).to_string()),
            ("limit", "1".to_string()),
        ];
        let request = self.request(content_type, &query, variant)?;
        let body = self.send(request).await?;
        Ok(body.entries.into_iter().next().map(ContentEntry::new))
    }
}

fn required<'a>(value: Option<&'a str>, key: &'static str) -> Result<&'a str, CollaboratorError> {
    value
        .filter(|value| !value.is_empty())
        .ok_or(CollaboratorError::NotConfigured {
            service: SERVICE,
            missing: key,
        })
}
