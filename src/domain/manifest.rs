//! Manifest cookie codec.
//!
//! The personalization engine writes the active `experience → variant`
//! assignments into a percent-encoded JSON cookie. Every reader of cookie-derived
//! personalization state goes through this module.

use std::collections::BTreeMap;

use axum_extra::extract::cookie::Cookie;
use phonepulse_api_types::ManifestPayload;
use thiserror::Error;

pub const MANIFEST_COOKIE: &str = "cs-personalize-manifest";

/// Active experiment assignments. Iteration order is by experiment id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    active_variants: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new(active_variants: BTreeMap<String, String>) -> Self {
        Self { active_variants }
    }

    pub fn is_empty(&self) -> bool {
        self.active_variants.is_empty()
    }

    /// First assignment in iteration order.
    ///
    /// Only one experiment is recovered when several are active.
    pub fn first_assignment(&self) -> Option<(&str, &str)> {
        self.active_variants
            .iter()
            .next()
            .map(|(experience, variant)| (experience.as_str(), variant.as_str()))
    }

    /// JSON form stored in the cookie, before percent-encoding.
    pub fn to_json(&self) -> String {
        let payload = ManifestPayload {
            active_variants: self.active_variants.clone(),
        };
        serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string())
    }
}

impl From<ManifestPayload> for Manifest {
    fn from(payload: ManifestPayload) -> Self {
        Self::new(payload.active_variants)
    }
}

/// Reasons a manifest could not be read. Callers treat every variant as "absent".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestDecodeFailure {
    #[error("manifest cookie absent")]
    Absent,
    #[error("manifest cookie is malformed: {0}")]
    Malformed(String),
}

/// Decode the manifest out of a raw `Cookie` header value.
pub fn decode(cookie_header: Option<&str>) -> Result<Manifest, ManifestDecodeFailure> {
    let raw = cookie_header
        .and_then(|header| find_cookie(header, MANIFEST_COOKIE))
        .ok_or(ManifestDecodeFailure::Absent)?;

    serde_json::from_str::<ManifestPayload>(&raw)
        .map(Manifest::from)
        .map_err(|err| ManifestDecodeFailure::Malformed(err.to_string()))
}

/// Look up a cookie by name in a raw `Cookie` header, percent-decoding its value.
///
/// Pairs that fail to parse are skipped; the first match wins.
pub fn find_cookie(cookie_header: &str, name: &str) -> Option<String> {
    Cookie::split_parse_encoded(cookie_header)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}
