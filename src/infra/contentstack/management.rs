use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::application::collaborators::{
    CollaboratorError, ContentManagement, CreatedEntry, EntryListing,
};
use crate::config::ContentstackSettings;
use crate::domain::content::{ContentEntry, ContentFields};
use crate::infra::error::InfraError;
use crate::infra::upstream::{base_url, read_json};

use super::{API_KEY_HEADER, EntriesResponse, entries_path};

const SERVICE: &str = "content management";

#[derive(Debug, Deserialize)]
struct CreateResponse {
    entry: CreatedEntryBody,
}

#[derive(Debug, Deserialize)]
struct CreatedEntryBody {
    uid: String,
}

/// Content Management API client.
#[derive(Debug, Clone)]
pub struct ContentstackManagement {
    client: Client,
    base: Url,
    api_key: Option<String>,
    management_token: Option<String>,
    branch: Option<String>,
}

impl ContentstackManagement {
    pub fn new(client: Client, settings: &ContentstackSettings) -> Result<Self, InfraError> {
        let base = base_url(&settings.management_host).map_err(|err| {
            InfraError::configuration(format!("invalid contentstack.management_host: {err}"))
        })?;
        Ok(Self {
            client,
            base,
            api_key: settings.api_key.clone(),
            management_token: settings.management_token.clone(),
            branch: settings.branch.clone(),
        })
    }

    fn credentials(&self) -> Result<(&str, &str), CollaboratorError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or(CollaboratorError::NotConfigured {
                service: SERVICE,
                missing: "contentstack.api_key",
            })?;
        let token = self
            .management_token
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or(CollaboratorError::NotConfigured {
                service: SERVICE,
                missing: "contentstack.management_token",
            })?;
        Ok((api_key, token))
    }

    fn entries_url(&self, content_type: &str) -> Result<Url, CollaboratorError> {
        self.base
            .join(&entries_path(content_type))
            .map_err(|err| CollaboratorError::transport(SERVICE, err))
    }

    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, CollaboratorError> {
        let (api_key, token) = self.credentials()?;
        let mut request = request
            .header(API_KEY_HEADER, api_key)
            .header(reqwest::header::AUTHORIZATION, token);
        if let Some(branch) = self.branch.as_deref() {
            request = request.header("branch", branch);
        }
        Ok(request)
    }
}

#[async_trait]
impl ContentManagement for ContentstackManagement {
    async fn create_entry(
        &self,
        content_type: &str,
        fields: ContentFields,
    ) -> Result<CreatedEntry, CollaboratorError> {
        let url = self.entries_url(content_type)?;
        let request = self
            .authorized(self.client.post(url))?
            .json(&json!({ "entry": fields }));
        let response = request
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;
        let body: CreateResponse = read_json(SERVICE, response).await?;
        Ok(CreatedEntry {
            uid: body.entry.uid,
        })
    }

    async fn list_entries(
        &self,
        content_type: &str,
        limit: u32,
        skip: u32,
    ) -> Result<EntryListing, CollaboratorError> {
        let mut url = self.entries_url(content_type)?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("skip", &skip.to_string())
            .append_pair("include_count", "true");

        let response = self
            .authorized(self.client.get(url))?
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;
        let body: EntriesResponse = read_json(SERVICE, response).await?;

        let entries: Vec<ContentEntry> = body.entries.into_iter().map(ContentEntry::new).collect();
        let count = entries.len() as u64;
        Ok(EntryListing {
            total: body.count.unwrap_or(count),
            count,
            entries,
        })
    }
}
