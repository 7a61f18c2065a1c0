//! Pipeline orchestration: cache consultation, provider fallback, fact
//! extraction, and confidence-dependent cache population.
//!
//! The orchestrator is the only component exposed to callers. It walks the
//! provider chain in priority order, stopping at the first tier that yields
//! a usable result, and always returns a structurally valid
//! [`AggregatedResult`] — total multi-tier failure degrades to an empty
//! `Low`-confidence result with caller-facing guidance, never an error.
//!
//! All collaborators are explicitly constructed and injected; there are no
//! process-wide singletons, so tests run against fresh state.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::confidence::ConfidenceScorer;
use crate::config::FetchConfig;
use crate::domains;
use crate::error::{FetchError, Result};
use crate::extract::StructuredExtractor;
use crate::limiter::RateLimiter;
use crate::provider::SpecProvider;
use crate::providers::{BraveApiProvider, DuckDuckGoProvider, SiteScrapeProvider};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::types::{
    AggregatedResult, ConfidenceLevel, ExtractedFact, FieldKind, ProviderResult, SpecQuery,
};

/// Guidance attached to the degraded result when every tier comes up empty.
const FALLBACK_GUIDANCE: &str =
    "No external source could be reached; consult the owner's manual or the \
     manufacturer's maintenance guide directly.";

/// Drives the retrieval pipeline end to end.
pub struct Orchestrator {
    cache: Arc<TtlCache>,
    limiter: Arc<RateLimiter>,
    providers: Vec<Arc<dyn SpecProvider>>,
    scorer: ConfidenceScorer,
    extractor: StructuredExtractor,
    ttl_high: Duration,
    ttl_low: Duration,
    inter_provider_delay: Duration,
    shut_down: AtomicBool,
}

impl Orchestrator {
    /// Build the production pipeline from configuration.
    ///
    /// The provider chain is ordered by decreasing reliability: the Brave
    /// API tier (only when an API key is configured), the free DuckDuckGo
    /// tier, and last-resort allow-list scraping.
    pub fn new(config: FetchConfig) -> Result<Self> {
        config.validate()?;

        let limiter = Arc::new(RateLimiter::new(
            config.max_requests_per_window,
            Duration::from_millis(config.window_ms),
        ));
        let executor = RetryExecutor::new(Arc::clone(&limiter), RetryPolicy::from_config(&config));

        let mut providers: Vec<Arc<dyn SpecProvider>> = Vec::new();
        match &config.api_key {
            Some(key) => providers.push(Arc::new(BraveApiProvider::new(
                &config,
                executor.clone(),
                key.clone(),
            )?)),
            None => tracing::info!("no API key configured, skipping primary search tier"),
        }
        providers.push(Arc::new(DuckDuckGoProvider::new(&config, executor.clone())?));
        providers.push(Arc::new(SiteScrapeProvider::new(&config, executor)?));

        let cache = Arc::new(TtlCache::new(config.cache_max_entries));
        Ok(Self::with_parts(&config, cache, limiter, providers))
    }

    /// Build a pipeline around injected collaborators. Used by tests and by
    /// hosts that want to share a cache or limiter across pipelines.
    pub fn with_parts(
        config: &FetchConfig,
        cache: Arc<TtlCache>,
        limiter: Arc<RateLimiter>,
        providers: Vec<Arc<dyn SpecProvider>>,
    ) -> Self {
        Self {
            cache,
            limiter,
            providers,
            scorer: ConfidenceScorer::new(config.thresholds.clone()),
            extractor: StructuredExtractor::new(),
            ttl_high: Duration::from_millis(config.cache_ttl_high_ms),
            ttl_low: Duration::from_millis(config.cache_ttl_low_ms),
            inter_provider_delay: Duration::from_millis(config.inter_provider_delay_ms),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Retrieve facts for a query, consulting the cache first and walking
    /// the provider chain on a miss.
    ///
    /// Always completes with an [`AggregatedResult`]: provider failures are
    /// logged and treated as empty tiers, and exhausting the chain yields
    /// the degraded fallback result rather than an error.
    ///
    /// # Errors
    ///
    /// Only invalid queries ([`FetchError::Config`]) and a shut-down
    /// pipeline ([`FetchError::ShuttingDown`]) are surfaced, both before
    /// any network activity begins.
    pub async fn fetch(&self, query: &SpecQuery) -> Result<AggregatedResult> {
        query.validate()?;
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(FetchError::ShuttingDown);
        }

        let key = query.cache_key();
        if let Some(mut hit) = self.cache.get(&key) {
            tracing::debug!(key = %key, "cache hit");
            hit.served_from_cache = true;
            return Ok(hit);
        }

        for (tier, provider) in self.providers.iter().enumerate() {
            // Small pause between sequential tiers keeps free backends
            // under their rate caps.
            if tier > 0 && !self.inter_provider_delay.is_zero() {
                tokio::time::sleep(self.inter_provider_delay).await;
            }

            let result = match provider.search(query).await {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(provider = provider.name(), error = %err, "tier failed");
                    continue;
                }
            };

            if !self.is_good_enough(&result) {
                tracing::debug!(provider = provider.name(), "tier insufficient, falling back");
                continue;
            }

            let aggregated = self.aggregate(query, result);
            self.cache.set(&key, aggregated.clone(), self.ttl_for(aggregated.confidence));
            tracing::info!(
                method = %aggregated.method,
                confidence = %aggregated.confidence,
                items = aggregated.items.len(),
                "fetch satisfied"
            );
            return Ok(aggregated);
        }

        // Total failure degrades rather than erroring; not cached, so the
        // next call retries the chain immediately.
        tracing::warn!(subject = %query.subject, "every tier failed, returning fallback result");
        Ok(AggregatedResult::fallback(FALLBACK_GUIDANCE))
    }

    /// Reject queued work and refuse further fetches. Called once at host
    /// teardown.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.limiter.shutdown();
    }

    /// Active cache sweep; the host runs this on its own interval.
    pub fn sweep_cache(&self) -> usize {
        self.cache.cleanup()
    }

    /// A tier is sufficient when it produced at least one item or its
    /// grade rose above `Low`.
    fn is_good_enough(&self, result: &ProviderResult) -> bool {
        !result.items.is_empty() || self.scorer.score(result) > ConfidenceLevel::Low
    }

    /// Run extraction over the chosen tier's items and grade the outcome.
    fn aggregate(&self, query: &SpecQuery, result: ProviderResult) -> AggregatedResult {
        let mut facts = Vec::new();
        for field in &query.fields {
            facts.extend(self.extractor.extract(&result.items, *field));
        }
        facts.sort_by(|a, b| b.reliability.cmp(&a.reliability));

        let confidence = self.grade(query, &result, &facts);

        AggregatedResult {
            sources: result.source_domains,
            confidence,
            method: result.provider,
            served_from_cache: false,
            facts,
            guidance: None,
            items: result.items,
        }
    }

    /// Single-field queries are graded directly from the provider result.
    /// Multi-field queries grade each fact category on the items that
    /// yielded facts for it, then fold the per-category grades with the
    /// corroboration-requiring aggregate rule.
    fn grade(
        &self,
        query: &SpecQuery,
        result: &ProviderResult,
        facts: &[ExtractedFact],
    ) -> ConfidenceLevel {
        if query.fields.len() < 2 {
            return self.scorer.score(result);
        }
        let levels: Vec<ConfidenceLevel> = query
            .fields
            .iter()
            .map(|field| self.scorer.score(&field_subset(result, facts, *field)))
            .collect();
        self.scorer.aggregate(&levels)
    }

    /// Confidence-dependent TTL: trusted results live longer, unreliable
    /// ones are re-fetched sooner.
    fn ttl_for(&self, confidence: ConfidenceLevel) -> Duration {
        match confidence {
            ConfidenceLevel::High => self.ttl_high,
            ConfidenceLevel::Medium | ConfidenceLevel::Low => self.ttl_low,
        }
    }
}

/// The items of `result` that yielded at least one fact of `field`,
/// repackaged for per-category grading.
fn field_subset(
    result: &ProviderResult,
    facts: &[ExtractedFact],
    field: FieldKind,
) -> ProviderResult {
    let urls: BTreeSet<&str> = facts
        .iter()
        .filter(|fact| fact.field == field)
        .map(|fact| fact.source_url.as_str())
        .collect();
    let items: Vec<_> = result
        .items
        .iter()
        .filter(|item| urls.contains(item.url.as_str()))
        .cloned()
        .collect();
    let source_domains = items
        .iter()
        .filter_map(|item| domains::domain_of(&item.url))
        .collect();
    ProviderResult {
        items,
        source_domains,
        provider: result.provider.clone(),
    }
}
