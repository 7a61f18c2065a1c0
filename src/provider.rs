//! Trait definition for pluggable spec-search providers.
//!
//! Each retrieval tier (paid search API, free HTML search, allow-list
//! scraping) implements [`SpecProvider`] behind a uniform result shape so
//! the orchestrator can walk them in priority order. The trait is
//! dyn-compatible so the chain is an ordered `Vec<Arc<dyn SpecProvider>>`
//! and tests can inject mock tiers.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::domains;
use crate::error::Result;
use crate::types::{ProviderResult, ResultItem, SpecQuery};

/// A pluggable spec-search backend.
///
/// Implementations compose several provider-specific query phrasings, run
/// every network call through the retry executor, and de-duplicate results
/// by URL. A provider never fails on "no results" — it returns an empty
/// [`ProviderResult`] and lets the orchestrator decide whether to continue
/// down the fallback chain. Errors are reserved for conditions that make
/// the provider unusable for this query (the orchestrator logs them and
/// treats them as empty).
#[async_trait]
pub trait SpecProvider: Send + Sync {
    /// Stable provider name, recorded in `AggregatedResult::method`.
    fn name(&self) -> &'static str;

    /// Run the query and return normalised, de-duplicated results.
    async fn search(&self, query: &SpecQuery) -> Result<ProviderResult>;
}

/// Assemble a [`ProviderResult`] from raw items: de-duplicate by URL
/// (first occurrence wins, preserving provider ranking) and collect the
/// distinct source domains.
pub fn assemble_result(provider: &'static str, items: Vec<ResultItem>) -> ProviderResult {
    let mut seen = BTreeSet::new();
    let mut deduped = Vec::with_capacity(items.len());
    let mut source_domains = BTreeSet::new();

    for item in items {
        if !seen.insert(item.url.clone()) {
            continue;
        }
        if let Some(domain) = domains::domain_of(&item.url) {
            source_domains.insert(domain);
        }
        deduped.push(item);
    }

    ProviderResult {
        items: deduped,
        source_domains,
        provider: provider.to_string(),
    }
}
