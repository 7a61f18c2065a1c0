//! Core types for the spec retrieval pipeline: queries, provider results,
//! aggregated results, and extracted facts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The kind of maintenance fact a caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Engine oil capacity (quarts or liters).
    OilCapacity,
    /// Oil viscosity grade, e.g. "0W-20".
    Viscosity,
    /// Oil filter part number.
    OilFilter,
    /// Drain plug torque (ft-lb or Nm).
    DrainPlugTorque,
}

impl FieldKind {
    /// Human-readable name used in query phrasing and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OilCapacity => "oil capacity",
            Self::Viscosity => "oil viscosity",
            Self::OilFilter => "oil filter",
            Self::DrainPlugTorque => "drain plug torque",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The vehicle a query is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Manufacturer, e.g. "Toyota".
    pub brand: String,
    /// Model name, e.g. "Camry".
    pub model: String,
    /// Model year, if known.
    pub year: Option<u16>,
}

impl Subject {
    /// Convenience constructor.
    pub fn new(brand: impl Into<String>, model: impl Into<String>, year: Option<u16>) -> Self {
        Self {
            brand: brand.into(),
            model: model.into(),
            year,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "{} {} {}", year, self.brand, self.model),
            None => write!(f, "{} {}", self.brand, self.model),
        }
    }
}

/// An immutable retrieval request: what vehicle, which fact kinds, and any
/// extra context (e.g. engine code). Also the basis of the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecQuery {
    /// The vehicle being looked up.
    pub subject: Subject,
    /// Which fact kinds the caller wants.
    pub fields: BTreeSet<FieldKind>,
    /// Optional disambiguation context, e.g. `engine → "2.5L"`.
    /// Ordered map so the cache key is independent of insertion order.
    pub context: BTreeMap<String, String>,
}

impl SpecQuery {
    /// Build a query for a subject and set of fields, with no extra context.
    pub fn new(subject: Subject, fields: impl IntoIterator<Item = FieldKind>) -> Self {
        Self {
            subject,
            fields: fields.into_iter().collect(),
            context: BTreeMap::new(),
        }
    }

    /// Deterministic cache key: a pure function of the normalised query.
    ///
    /// Subject text is lowercased with whitespace collapsed; fields are
    /// already sorted (`BTreeSet`), context pairs are already sorted
    /// (`BTreeMap`). Two queries for the same subject and fields always
    /// produce the same key, independent of call order.
    pub fn cache_key(&self) -> String {
        let mut key = normalise(&self.subject.brand);
        key.push(' ');
        key.push_str(&normalise(&self.subject.model));
        if let Some(year) = self.subject.year {
            key.push(' ');
            key.push_str(&year.to_string());
        }
        for field in &self.fields {
            key.push('|');
            key.push_str(field.name());
        }
        for (k, v) in &self.context {
            key.push('|');
            key.push_str(&normalise(k));
            key.push('=');
            key.push_str(&normalise(v));
        }
        key
    }

    /// Reject queries that cannot be phrased into a search. Surfaced
    /// synchronously, before any network activity begins.
    pub fn validate(&self) -> Result<(), crate::error::FetchError> {
        if self.subject.brand.trim().is_empty() {
            return Err(crate::error::FetchError::Config(
                "subject brand must not be empty".into(),
            ));
        }
        if self.subject.model.trim().is_empty() {
            return Err(crate::error::FetchError::Config(
                "subject model must not be empty".into(),
            ));
        }
        if self.fields.is_empty() {
            return Err(crate::error::FetchError::Config(
                "at least one field kind must be requested".into(),
            ));
        }
        Ok(())
    }
}

/// Lowercase and collapse internal whitespace runs to single spaces.
fn normalise(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A single item returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    /// Title of the result page.
    pub title: String,
    /// URL of the result.
    pub url: String,
    /// Text snippet summarising the page content.
    pub snippet: String,
}

/// Normalised output of one provider adapter for one query.
///
/// Adapters never fail on "no results" — an empty `items` list is a valid
/// outcome that lets the orchestrator continue down the fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    /// De-duplicated result items, in provider order.
    pub items: Vec<ResultItem>,
    /// Distinct registrable domains the items came from.
    pub source_domains: BTreeSet<String>,
    /// Name of the provider that produced this result.
    pub provider: String,
}

impl ProviderResult {
    /// An empty result attributed to the given provider.
    pub fn empty(provider: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            source_domains: BTreeSet::new(),
            provider: provider.into(),
        }
    }
}

/// Coarse trust grade for a retrieved result set.
///
/// Total order: `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ConfidenceLevel {
    /// Zero or a single uncorroborated result.
    Low,
    /// Multiple results but no authoritative source.
    Medium,
    /// Authoritative source plus corroboration.
    High,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// A typed fact pulled out of free text, stamped with source reliability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFact {
    /// Which fact kind this value belongs to.
    pub field: FieldKind,
    /// The extracted value, e.g. "4.8" or "0W-20".
    pub value: String,
    /// Unit for numeric values, e.g. "quarts".
    pub unit: Option<String>,
    /// Engine descriptors found near the match, e.g. ["2.5L"].
    pub engine_context: Vec<String>,
    /// Registrable domain of the source page.
    pub source_domain: String,
    /// URL of the source page.
    pub source_url: String,
    /// Source trust weight in 0..=100; higher ranks first.
    pub reliability: u8,
}

/// The only object returned to callers: merged items, their sources, a
/// confidence grade, and observability metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    /// Result items from the provider that satisfied the request.
    pub items: Vec<ResultItem>,
    /// Distinct source domains behind `items`.
    pub sources: BTreeSet<String>,
    /// Trust grade for this result set.
    pub confidence: ConfidenceLevel,
    /// Which provider satisfied the request, or `"Fallback"`.
    pub method: String,
    /// Whether this result came from the cache.
    pub served_from_cache: bool,
    /// Structured facts extracted from `items`, sorted by reliability
    /// descending. All candidates are retained for audit.
    pub facts: Vec<ExtractedFact>,
    /// Caller-facing hint set when every provider tier came up empty.
    pub guidance: Option<String>,
}

impl AggregatedResult {
    /// The degraded result returned when every provider tier fails:
    /// structurally valid, empty, `Low` confidence, never an error.
    pub fn fallback(guidance: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            sources: BTreeSet::new(),
            confidence: ConfidenceLevel::Low,
            method: "Fallback".into(),
            served_from_cache: false,
            facts: Vec::new(),
            guidance: Some(guidance.into()),
        }
    }
}
