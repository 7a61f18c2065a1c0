//! Pipeline configuration with sensible defaults.
//!
//! [`FetchConfig`] controls rate limiting, retry/backoff, caching, and
//! provider behaviour. Use [`Default::default()`] or load overrides from
//! `SPECFETCH_*` environment variables via [`FetchConfig::from_env`].

use crate::error::FetchError;

/// Tunable confidence thresholds.
///
/// These are empirically chosen constants, not invariants, so they live in
/// configuration rather than being hardcoded in the scorer.
#[derive(Debug, Clone)]
pub struct ConfidenceThresholds {
    /// Minimum authoritative source count for a `High` grade.
    pub min_authoritative_high: usize,
    /// Minimum distinct item count for a `High` grade.
    pub min_items_high: usize,
    /// Minimum distinct item count for a `Medium` grade.
    pub min_items_medium: usize,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            min_authoritative_high: 1,
            min_items_high: 3,
            min_items_medium: 2,
        }
    }
}

/// Configuration for the retrieval pipeline.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// API key for the primary search provider. Without it, the primary
    /// tier is skipped and retrieval starts at the free fallback tier.
    pub api_key: Option<String>,
    /// Maximum rate-limiter acquisitions per window.
    pub max_requests_per_window: u32,
    /// Rate window length in milliseconds.
    pub window_ms: u64,
    /// Total attempts per network call (first try plus retries).
    pub retry_max_attempts: u32,
    /// Base backoff delay in milliseconds.
    pub retry_initial_delay_ms: u64,
    /// Backoff delay ceiling in milliseconds.
    pub retry_max_delay_ms: u64,
    /// Hard per-attempt timeout in milliseconds.
    pub attempt_timeout_ms: u64,
    /// Maximum number of cached result sets.
    pub cache_max_entries: usize,
    /// Cache TTL for `High` confidence results, in milliseconds.
    pub cache_ttl_high_ms: u64,
    /// Cache TTL for `Low`/`Medium` confidence results, in milliseconds.
    /// Shorter, so unreliable answers are re-fetched sooner.
    pub cache_ttl_low_ms: u64,
    /// Delay between sequential provider tiers, in milliseconds.
    /// Keeps free-tier backends under their rate caps.
    pub inter_provider_delay_ms: u64,
    /// Result count requested from each provider.
    pub result_count: usize,
    /// Locale parameter sent to search backends.
    pub locale: String,
    /// Custom User-Agent. If `None`, rotates through a built-in list of
    /// realistic browser User-Agents.
    pub user_agent: Option<String>,
    /// Confidence grading thresholds.
    pub thresholds: ConfidenceThresholds,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            max_requests_per_window: 50,
            window_ms: 60_000,
            retry_max_attempts: 3,
            retry_initial_delay_ms: 1_000,
            retry_max_delay_ms: 10_000,
            attempt_timeout_ms: 10_000,
            cache_max_entries: 100,
            cache_ttl_high_ms: 86_400_000,
            cache_ttl_low_ms: 21_600_000,
            inter_provider_delay_ms: 500,
            result_count: 10,
            locale: "en-US".into(),
            user_agent: None,
            thresholds: ConfidenceThresholds::default(),
        }
    }
}

impl FetchConfig {
    /// Build a config from `SPECFETCH_*` environment variables, falling
    /// back to defaults for anything unset or unparseable.
    ///
    /// Recognised variables: `SPECFETCH_API_KEY`,
    /// `SPECFETCH_MAX_REQUESTS_PER_WINDOW`, `SPECFETCH_WINDOW_MS`,
    /// `SPECFETCH_RETRY_MAX_ATTEMPTS`, `SPECFETCH_RETRY_INITIAL_DELAY_MS`,
    /// `SPECFETCH_RETRY_MAX_DELAY_MS`, `SPECFETCH_ATTEMPT_TIMEOUT_MS`,
    /// `SPECFETCH_CACHE_MAX_ENTRIES`, `SPECFETCH_CACHE_TTL_HIGH_MS`,
    /// `SPECFETCH_CACHE_TTL_LOW_MS`, `SPECFETCH_LOCALE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.api_key = env_string("SPECFETCH_API_KEY");
        if let Some(v) = env_parse("SPECFETCH_MAX_REQUESTS_PER_WINDOW") {
            config.max_requests_per_window = v;
        }
        if let Some(v) = env_parse("SPECFETCH_WINDOW_MS") {
            config.window_ms = v;
        }
        if let Some(v) = env_parse("SPECFETCH_RETRY_MAX_ATTEMPTS") {
            config.retry_max_attempts = v;
        }
        if let Some(v) = env_parse("SPECFETCH_RETRY_INITIAL_DELAY_MS") {
            config.retry_initial_delay_ms = v;
        }
        if let Some(v) = env_parse("SPECFETCH_RETRY_MAX_DELAY_MS") {
            config.retry_max_delay_ms = v;
        }
        if let Some(v) = env_parse("SPECFETCH_ATTEMPT_TIMEOUT_MS") {
            config.attempt_timeout_ms = v;
        }
        if let Some(v) = env_parse("SPECFETCH_CACHE_MAX_ENTRIES") {
            config.cache_max_entries = v;
        }
        if let Some(v) = env_parse("SPECFETCH_CACHE_TTL_HIGH_MS") {
            config.cache_ttl_high_ms = v;
        }
        if let Some(v) = env_parse("SPECFETCH_CACHE_TTL_LOW_MS") {
            config.cache_ttl_low_ms = v;
        }
        if let Some(v) = env_string("SPECFETCH_LOCALE") {
            config.locale = v;
        }
        config
    }

    /// Validates this configuration, returning an error if any field is
    /// invalid.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.max_requests_per_window == 0 {
            return Err(FetchError::Config(
                "max_requests_per_window must be greater than 0".into(),
            ));
        }
        if self.window_ms == 0 {
            return Err(FetchError::Config("window_ms must be greater than 0".into()));
        }
        if self.retry_max_attempts == 0 {
            return Err(FetchError::Config(
                "retry_max_attempts must be greater than 0".into(),
            ));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(FetchError::Config(
                "attempt_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.retry_initial_delay_ms > self.retry_max_delay_ms {
            return Err(FetchError::Config(
                "retry_initial_delay_ms must be <= retry_max_delay_ms".into(),
            ));
        }
        if self.cache_max_entries == 0 {
            return Err(FetchError::Config(
                "cache_max_entries must be greater than 0".into(),
            ));
        }
        if self.result_count == 0 {
            return Err(FetchError::Config(
                "result_count must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_spec_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.max_requests_per_window, 50);
        assert_eq!(config.window_ms, 60_000);
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.retry_initial_delay_ms, 1_000);
        assert_eq!(config.retry_max_delay_ms, 10_000);
        assert_eq!(config.attempt_timeout_ms, 10_000);
        assert_eq!(config.cache_max_entries, 100);
        assert_eq!(config.cache_ttl_high_ms, 86_400_000);
        assert_eq!(config.cache_ttl_low_ms, 21_600_000);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn default_thresholds_match_scoring_rules() {
        let thresholds = ConfidenceThresholds::default();
        assert_eq!(thresholds.min_authoritative_high, 1);
        assert_eq!(thresholds.min_items_high, 3);
        assert_eq!(thresholds.min_items_medium, 2);
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(FetchConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_rate_limit_rejected() {
        let config = FetchConfig {
            max_requests_per_window: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_requests_per_window"));
    }

    #[test]
    fn zero_window_rejected() {
        let config = FetchConfig {
            window_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_attempts_rejected() {
        let config = FetchConfig {
            retry_max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_backoff_range_rejected() {
        let config = FetchConfig {
            retry_initial_delay_ms: 20_000,
            retry_max_delay_ms: 10_000,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retry_initial_delay_ms"));
    }

    #[test]
    fn zero_cache_capacity_rejected() {
        let config = FetchConfig {
            cache_max_entries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn low_ttl_shorter_than_high_ttl_by_default() {
        let config = FetchConfig::default();
        assert!(config.cache_ttl_low_ms < config.cache_ttl_high_ms);
    }
}
