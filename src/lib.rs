//! # specfetch
//!
//! Resilient multi-tier retrieval of vehicle maintenance facts (oil
//! capacity, viscosity, filter part numbers, drain plug torque) from
//! external web sources.
//!
//! ## Design
//!
//! - Ordered provider chain: Brave Search API → DuckDuckGo HTML →
//!   allow-list page scraping, walked until one tier yields a usable result
//! - Every network attempt goes through a queuing rate limiter and a retry
//!   executor with per-attempt timeout and jittered exponential backoff
//! - Results are graded `Low`/`Medium`/`High` from source count and domain
//!   authority, and cached with a confidence-dependent TTL
//! - Structured facts are extracted from free-text snippets and ranked by
//!   source reliability; conflicting candidates are retained for audit
//! - Total multi-tier failure degrades to an empty low-confidence result
//!   with caller-facing guidance — [`Orchestrator::fetch`] never fails on
//!   network conditions
//!
//! ## Security
//!
//! - The only secret is the optional search API key, read from
//!   configuration and sent solely to its own endpoint
//! - No network listeners — this is a library, not a server
//! - Query subjects are logged only at debug level and below
//! - Provider responses are parsed against strict schemas that fail closed

pub mod cache;
pub mod clock;
pub mod confidence;
pub mod config;
pub mod domains;
pub mod error;
pub mod extract;
pub mod http;
pub mod limiter;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod types;

pub use cache::{CacheStats, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use confidence::ConfidenceScorer;
pub use config::{ConfidenceThresholds, FetchConfig};
pub use error::{FetchError, Result};
pub use extract::StructuredExtractor;
pub use limiter::RateLimiter;
pub use orchestrator::Orchestrator;
pub use provider::SpecProvider;
pub use retry::{RetryExecutor, RetryPolicy};
pub use types::{
    AggregatedResult, ConfidenceLevel, ExtractedFact, FieldKind, ResultItem, SpecQuery, Subject,
};

/// Fetch maintenance facts for a vehicle with default configuration.
///
/// Convenience wrapper that builds a fresh [`Orchestrator`] per call. Hosts
/// issuing more than one query should construct an [`Orchestrator`] once
/// and reuse it, so the cache and rate window are shared across calls.
///
/// # Errors
///
/// Returns [`FetchError::Config`] for an invalid query or configuration.
/// Network failures never surface here — they degrade to a low-confidence
/// fallback result.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> specfetch::Result<()> {
/// use specfetch::{FieldKind, SpecQuery, Subject};
///
/// let query = SpecQuery::new(
///     Subject::new("Toyota", "Camry", Some(2020)),
///     [FieldKind::OilCapacity, FieldKind::Viscosity],
/// );
/// let result = specfetch::fetch(&query).await?;
/// println!("{} ({} confidence)", result.method, result.confidence);
/// for fact in &result.facts {
///     println!("{}: {} [{}]", fact.field, fact.value, fact.source_domain);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn fetch(query: &SpecQuery) -> Result<AggregatedResult> {
    let orchestrator = Orchestrator::new(FetchConfig::from_env())?;
    orchestrator.fetch(query).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_rejects_invalid_query_before_any_network() {
        let query = SpecQuery::new(Subject::new("", "", None), [FieldKind::OilCapacity]);
        let err = fetch(&query).await.expect_err("empty subject");
        assert!(matches!(err, FetchError::Config(_)));
    }

    #[tokio::test]
    async fn fetch_rejects_empty_field_set() {
        let query = SpecQuery::new(Subject::new("Toyota", "Camry", Some(2020)), []);
        let err = fetch(&query).await.expect_err("no fields");
        assert!(err.to_string().contains("field"));
    }
}
