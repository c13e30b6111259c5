//! Origin-side recovery of the variant decision.

use metrics::counter;
use tracing::debug;

use crate::domain::manifest::{self, ManifestDecodeFailure};
use crate::domain::variant::{VariantDecision, VariantParam};

/// Where the decision for a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantSource {
    Query,
    LegacyQuery,
    Manifest,
    None,
}

impl VariantSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantSource::Query => "query",
            VariantSource::LegacyQuery => "legacy_query",
            VariantSource::Manifest => "manifest",
            VariantSource::None => "none",
        }
    }
}

/// Raw inputs of the fallback chain for one request.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantInputs<'a> {
    /// Value of the engine-owned query parameter.
    pub primary: Option<&'a str>,
    /// Value of the non-namespaced legacy query parameter.
    pub legacy: Option<&'a str>,
    /// Raw `Cookie` header.
    pub cookie_header: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVariant {
    pub decision: VariantDecision,
    pub source: VariantSource,
}

impl ResolvedVariant {
    fn new(param: Option<VariantParam>, source: VariantSource) -> Self {
        Self {
            decision: VariantDecision::new(param),
            source,
        }
    }
}

/// Take the engine-owned query parameter as-is.
pub fn resolve_at_face_value(inputs: VariantInputs<'_>) -> ResolvedVariant {
    let resolved = match inputs.primary.and_then(VariantParam::parse) {
        Some(param) => ResolvedVariant::new(Some(param), VariantSource::Query),
        None => ResolvedVariant::new(None, VariantSource::None),
    };
    record(&resolved);
    resolved
}

/// Query parameter, then the legacy alias, then the manifest cookie.
///
/// The manifest is consulted when no param was found or the param is degenerate.
/// A degenerate param survives when the manifest yields no assignment.
pub fn resolve_with_fallback(inputs: VariantInputs<'_>) -> ResolvedVariant {
    let (param, source) = match (
        inputs.primary.and_then(VariantParam::parse),
        inputs.legacy.and_then(VariantParam::parse),
    ) {
        (Some(param), _) => (Some(param), VariantSource::Query),
        (None, Some(param)) => (Some(param), VariantSource::LegacyQuery),
        (None, None) => (None, VariantSource::None),
    };

    let needs_recovery = param.as_ref().is_none_or(VariantParam::is_degenerate);
    let resolved = if needs_recovery {
        match recover_from_manifest(inputs.cookie_header) {
            Some(recovered) => ResolvedVariant::new(Some(recovered), VariantSource::Manifest),
            None => ResolvedVariant::new(param, source),
        }
    } else {
        ResolvedVariant::new(param, source)
    };

    record(&resolved);
    resolved
}

fn recover_from_manifest(cookie_header: Option<&str>) -> Option<VariantParam> {
    match manifest::decode(cookie_header) {
        Ok(manifest) => {
            let recovered = manifest
                .first_assignment()
                .map(|(experience, variant)| VariantParam::from_assignment(experience, variant));
            if recovered.is_none() {
                debug!(
                    target = "phonepulse::origin::variant",
                    "manifest cookie holds no active variants"
                );
            }
            recovered
        }
        Err(ManifestDecodeFailure::Absent) => None,
        Err(err @ ManifestDecodeFailure::Malformed(_)) => {
            debug!(
                target = "phonepulse::origin::variant",
                error = %err,
                "ignoring unreadable manifest cookie"
            );
            None
        }
    }
}

fn record(resolved: &ResolvedVariant) {
    counter!(
        "phonepulse_origin_variant_source_total",
        "source" => resolved.source.as_str()
    )
    .increment(1);
}
