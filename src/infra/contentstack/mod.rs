//! Contentstack adapters for the CMS collaborator traits.

mod delivery;
mod management;

pub use delivery::ContentstackDelivery;
pub use management::ContentstackManagement;

use serde::Deserialize;
use serde_json::Value;

const API_KEY_HEADER: &str = "api_key";

/// `{"entries": [...], "count": n}` as returned by both APIs.
#[derive(Debug, Deserialize)]
struct EntriesResponse {
    #[serde(default)]
    entries: Vec<Value>,
    #[serde(default)]
    count: Option<u64>,
}

fn entries_path(content_type: &str) -> String {
    format!("v3/content_types/{content_type}/entries")
}
