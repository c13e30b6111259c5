//! Variant decisions and the alias decoding rule used by the content store.

use std::fmt;

/// Substring marking a pair for which no real variant was computed (e.g. `0_null`).
pub const NULL_VARIANT_MARKER: &str = "_null";
/// Prefix the content store expects in front of every variant alias.
pub const VARIANT_ALIAS_PREFIX: &str = "cs_personalize_";

const PAIR_SEPARATOR: char = ',';
const UID_SEPARATOR: char = '_';

/// Composite variant identifier, conventionally `{experience}_{variant}`.
///
/// The value is kept opaque; only the alias decoder looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantParam(String);

impl VariantParam {
    /// Accept a raw query value. Empty values carry no decision.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// Synthesize a param from one recovered manifest assignment.
    pub fn from_assignment(experience: &str, variant: &str) -> Self {
        Self(format!("{experience}{UID_SEPARATOR}{variant}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the engine signalled that nothing was actually decided.
    pub fn is_degenerate(&self) -> bool {
        self.0.contains(NULL_VARIANT_MARKER)
    }
}

impl fmt::Display for VariantParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The personalization state resolved for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantDecision {
    variant_param: Option<VariantParam>,
}

impl VariantDecision {
    pub fn new(variant_param: Option<VariantParam>) -> Self {
        Self { variant_param }
    }

    pub fn unpersonalized() -> Self {
        Self::default()
    }

    pub fn is_personalized(&self) -> bool {
        self.variant_param.is_some()
    }

    pub fn variant_param(&self) -> Option<&VariantParam> {
        self.variant_param.as_ref()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.variant_param.as_ref().map(VariantParam::as_str)
    }
}

/// One `experience → variant` pair addressed by the content store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantAlias {
    pub experience: String,
    pub variant: String,
}

impl VariantAlias {
    /// Parse an alias token of the form `cs_personalize_{experience}_{variant}`.
    pub fn parse(token: &str) -> Option<Self> {
        let rest = token.strip_prefix(VARIANT_ALIAS_PREFIX)?;
        let (experience, variant) = rest.split_once(UID_SEPARATOR)?;
        if experience.is_empty() || variant.is_empty() {
            return None;
        }
        Some(Self {
            experience: experience.to_string(),
            variant: variant.to_string(),
        })
    }
}

impl fmt::Display for VariantAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{VARIANT_ALIAS_PREFIX}{}{UID_SEPARATOR}{}",
            self.experience, self.variant
        )
    }
}

/// Ordered, duplicate-free set of aliases. Empty means default content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantAliasSet {
    aliases: Vec<VariantAlias>,
}

impl VariantAliasSet {
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.aliases.iter().map(ToString::to_string).collect()
    }

    /// Comma-joined form passed to the content query, `None` when empty.
    pub fn to_query_value(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.tokens().join(","))
    }

    fn insert(&mut self, alias: VariantAlias) {
        if !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
    }
}

impl FromIterator<VariantAlias> for VariantAliasSet {
    fn from_iter<I: IntoIterator<Item = VariantAlias>>(iter: I) -> Self {
        let mut set = Self::default();
        for alias in iter {
            set.insert(alias);
        }
        set
    }
}

/// Map a variant param to the aliases the content store understands.
///
/// Pairs are comma separated; each pair splits at its first `_`. Pairs whose
/// variant is empty or `null` contribute nothing.
pub fn resolve(param: &VariantParam) -> VariantAliasSet {
    param
        .as_str()
        .split(PAIR_SEPARATOR)
        .filter_map(|pair| {
            let (experience, variant) = pair.trim().split_once(UID_SEPARATOR)?;
            if experience.is_empty() || variant.is_empty() || variant == "null" {
                return None;
            }
            Some(VariantAlias {
                experience: experience.to_string(),
                variant: variant.to_string(),
            })
        })
        .collect()
}
