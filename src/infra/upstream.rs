//! Outbound HTTP client shared by every collaborator adapter.

use reqwest::{Client, redirect};
use serde::de::DeserializeOwned;
use url::Url;

use crate::application::collaborators::CollaboratorError;
use crate::config::UpstreamSettings;

use super::error::InfraError;

pub fn user_agent() -> &'static str {
    concat!("phonepulse/", env!("CARGO_PKG_VERSION"))
}

/// Build the client. Without a configured timeout none is applied.
pub fn build_client(settings: &UpstreamSettings) -> Result<Client, InfraError> {
    let mut builder = Client::builder()
        .user_agent(user_agent())
        .redirect(redirect::Policy::none());
    if let Some(timeout) = settings.timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Parse a base URL, accepting bare hosts, and make sure it ends with `/` so joins append.
pub fn base_url(raw: &str) -> Result<Url, url::ParseError> {
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let mut url = Url::parse(&candidate)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Decode a JSON body, turning non-success statuses into `CollaboratorError::Status`.
pub async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T, CollaboratorError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| CollaboratorError::transport(service, err))?;
    if !status.is_success() {
        return Err(CollaboratorError::Status {
            service,
            status: status.as_u16(),
            message: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    serde_json::from_slice(&bytes).map_err(|err| CollaboratorError::decode(service, err))
}
