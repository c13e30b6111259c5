//! Contracts of the CMS services the application depends on.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::content::{ContentEntry, ContentFields, EntryCollection};
use crate::domain::variant::VariantParam;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} is not configured: missing {missing}")]
    NotConfigured {
        service: &'static str,
        missing: &'static str,
    },
    #[error("request to {service} failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },
    #[error("{service} responded with status {status}: {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },
    #[error("{service} returned an unreadable payload: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn transport(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            service,
            message: err.to_string(),
        }
    }

    pub fn decode(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            service,
            message: err.to_string(),
        }
    }
}

/// Read side of the CMS. Implementations fail with an error on upstream failure.
#[async_trait]
pub trait ContentDelivery: Send + Sync {
    /// All entries of a content type, narrowed to the variant when one is given.
    async fn get_all_entries(
        &self,
        content_type: &str,
        variant: Option<&VariantParam>,
    ) -> Result<EntryCollection, CollaboratorError>;

    async fn get_entry_by_slug(
        &self,
        content_type: &str,
        slug: &str,
        variant: Option<&VariantParam>,
    ) -> Result<Option<ContentEntry>, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEntry {
    pub uid: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryListing {
    pub entries: Vec<ContentEntry>,
    pub count: u64,
    pub total: u64,
}

/// Write side of the CMS.
#[async_trait]
pub trait ContentManagement: Send + Sync {
    async fn create_entry(
        &self,
        content_type: &str,
        fields: ContentFields,
    ) -> Result<CreatedEntry, CollaboratorError>;

    async fn list_entries(
        &self,
        content_type: &str,
        limit: u32,
        skip: u32,
    ) -> Result<EntryListing, CollaboratorError>;
}
