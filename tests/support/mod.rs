#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use phonepulse::application::collaborators::{
    CollaboratorError, ContentDelivery, ContentManagement, CreatedEntry, EntryListing,
};
use phonepulse::application::personalize::{
    Attributes, PersonalizeEngine, PersonalizeError, PersonalizeSession, RequestState,
    StateCookie,
};
use phonepulse::domain::content::{ContentEntry, ContentFields, EntryCollection};
use phonepulse::domain::variant::{self, VariantParam};

fn upstream_failure(service: &'static str) -> CollaboratorError {
    CollaboratorError::Status {
        service,
        status: 502,
        message: "upstream unavailable".to_string(),
    }
}

/// Delivery fake that serves a fixed set of entries and records every call.
#[derive(Default)]
pub struct FakeDelivery {
    entries: Vec<Value>,
    fail: bool,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeDelivery {
    pub fn with_entries(entries: Vec<Value>) -> Self {
        Self {
            entries,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// `(content_type, variant)` for each call, in order.
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, content_type: &str, variant: Option<&VariantParam>) {
        self.calls.lock().expect("calls lock").push((
            content_type.to_string(),
            variant.map(|param| param.as_str().to_string()),
        ));
    }
}

#[async_trait]
impl ContentDelivery for FakeDelivery {
    async fn get_all_entries(
        &self,
        content_type: &str,
        variant: Option<&VariantParam>,
    ) -> Result<EntryCollection, CollaboratorError> {
        self.record(content_type, variant);
        if self.fail {
            return Err(upstream_failure("contentstack delivery"));
        }
        Ok(EntryCollection::new(
            self.entries.iter().cloned().map(ContentEntry::new).collect(),
        ))
    }

    async fn get_entry_by_slug(
        &self,
        content_type: &str,
        slug: &str,
        variant: Option<&VariantParam>,
    ) -> Result<Option<ContentEntry>, CollaboratorError> {
        self.record(content_type, variant);
        if self.fail {
            return Err(upstream_failure("contentstack delivery"));
        }
        Ok(self
            .entries
            .iter()
            .find(|entry| entry.get("slug").and_then(Value::as_str) == Some(slug))
            .cloned()
            .map(ContentEntry::new))
    }
}

/// Management fake that stores created entries in memory.
#[derive(Default)]
pub struct FakeManagement {
    fail: bool,
    created: Mutex<Vec<(String, ContentFields)>>,
}

impl FakeManagement {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn created(&self) -> Vec<(String, ContentFields)> {
        self.created.lock().expect("created lock").clone()
    }
}

#[async_trait]
impl ContentManagement for FakeManagement {
    async fn create_entry(
        &self,
        content_type: &str,
        fields: ContentFields,
    ) -> Result<CreatedEntry, CollaboratorError> {
        if self.fail {
            return Err(upstream_failure("contentstack management"));
        }
        let mut created = self.created.lock().expect("created lock");
        created.push((content_type.to_string(), fields));
        Ok(CreatedEntry {
            uid: format!("blt{}", created.len()),
        })
    }

    async fn list_entries(
        &self,
        _content_type: &str,
        limit: u32,
        skip: u32,
    ) -> Result<EntryListing, CollaboratorError> {
        if self.fail {
            return Err(upstream_failure("contentstack management"));
        }
        let created = self.created.lock().expect("created lock");
        let entries: Vec<ContentEntry> = created
            .iter()
            .skip(skip as usize)
            .take(limit as usize)
            .map(|(_, fields)| ContentEntry::new(Value::Object(fields.clone())))
            .collect();
        Ok(EntryListing {
            count: entries.len() as u64,
            total: created.len() as u64,
            entries,
        })
    }
}

/// Engine fake whose decision depends on the `budget` attribute.
///
/// Every call is appended to a shared log so tests can assert ordering.
#[derive(Default)]
pub struct FakeEngine {
    pub log: Arc<Mutex<Vec<String>>>,
    pub fail_init: bool,
    pub fail_impressions: bool,
}

impl FakeEngine {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().expect("log lock").clone()
    }
}

#[async_trait]
impl PersonalizeEngine for FakeEngine {
    async fn init(
        &self,
        _request: &RequestState,
    ) -> Result<Box<dyn PersonalizeSession>, PersonalizeError> {
        self.log.lock().expect("log lock").push("init".to_string());
        if self.fail_init {
            return Err(PersonalizeError::Init("engine unreachable".to_string()));
        }
        Ok(Box::new(FakeSession {
            log: Arc::clone(&self.log),
            budget: None,
            fail_impressions: self.fail_impressions,
        }))
    }
}

struct FakeSession {
    log: Arc<Mutex<Vec<String>>>,
    budget: Option<String>,
    fail_impressions: bool,
}

impl FakeSession {
    fn push(&self, entry: String) {
        self.log.lock().expect("log lock").push(entry);
    }
}

#[async_trait]
impl PersonalizeSession for FakeSession {
    async fn set(&mut self, attributes: Attributes) -> Result<(), PersonalizeError> {
        self.budget = attributes
            .get("budget")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.push(format!(
            "set:budget={}",
            self.budget.as_deref().unwrap_or_default()
        ));
        Ok(())
    }

    fn variant_param(&self) -> String {
        self.push("variant".to_string());
        match self.budget.as_deref() {
            Some("premium") => "1_2".to_string(),
            Some(_) => "1_1".to_string(),
            None => "1_null".to_string(),
        }
    }

    fn variant_aliases(&self) -> Vec<String> {
        let param = match self.budget.as_deref() {
            Some("premium") => "1_2",
            Some(_) => "1_1",
            None => "1_null",
        };
        VariantParam::parse(param)
            .map(|param| variant::resolve(&param).tokens())
            .unwrap_or_default()
    }

    async fn trigger_impressions(&self, aliases: &[String]) -> Result<(), PersonalizeError> {
        self.push(format!("impressions:{}", aliases.join(",")));
        if self.fail_impressions {
            return Err(PersonalizeError::Impressions(
                "events endpoint down".to_string(),
            ));
        }
        Ok(())
    }

    fn state_cookies(&self) -> Vec<StateCookie> {
        vec![
            StateCookie::new("cs-personalize-user-uid", "user-1"),
            StateCookie::new("cs-personalize-manifest", r#"{"activeVariants":{"1":"2"}}"#),
        ]
    }
}
