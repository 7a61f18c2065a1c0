//! HTTP client construction shared by all provider tiers.
//!
//! Builds a [`reqwest::Client`] that looks like an ordinary browser:
//! rotated User-Agent, an `Accept-Language` derived from the configured
//! locale, and a cookie store for consent interstitials. Per-attempt
//! deadlines live in the retry executor; the client-level timeout is only
//! a backstop for attempts the executor never gets to cancel.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::FetchError;

/// Browser User-Agents rotated across client instances. One entry per
/// platform family so repeated runs don't present a single fingerprint.
const USER_AGENT_POOL: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:134.0) Gecko/20100101 Firefox/134.0",
];

/// How much longer than the per-attempt deadline the client waits before
/// giving up on its own.
const BACKSTOP_FACTOR: u64 = 2;

/// Build the [`reqwest::Client`] used by a provider tier.
///
/// # Errors
///
/// Returns [`FetchError::Network`] if the client cannot be constructed or
/// the configured locale is not a valid header value.
pub fn build_client(config: &FetchConfig) -> Result<reqwest::Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, accept_language(&config.locale)?);

    reqwest::Client::builder()
        .user_agent(user_agent_for(config))
        .default_headers(headers)
        .cookie_store(true)
        .timeout(backstop_timeout(config))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))
}

/// The configured User-Agent, or one drawn from the rotation pool.
fn user_agent_for(config: &FetchConfig) -> String {
    if let Some(custom) = &config.user_agent {
        return custom.clone();
    }
    let index = rand::random::<usize>() % USER_AGENT_POOL.len();
    USER_AGENT_POOL[index].to_string()
}

/// `Accept-Language` value for the configured locale, e.g.
/// `en-US,en;q=0.8`.
fn accept_language(locale: &str) -> Result<HeaderValue, FetchError> {
    let language = locale.split('-').next().unwrap_or(locale);
    let value = format!("{locale},{language};q=0.8");
    HeaderValue::from_str(&value)
        .map_err(|_| FetchError::Network(format!("locale {locale:?} is not a valid header value")))
}

fn backstop_timeout(config: &FetchConfig) -> Duration {
    Duration::from_millis(config.attempt_timeout_ms.saturating_mul(BACKSTOP_FACTOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotated_agent_comes_from_the_pool() {
        let config = FetchConfig::default();
        for _ in 0..20 {
            let ua = user_agent_for(&config);
            assert!(USER_AGENT_POOL.contains(&ua.as_str()), "unexpected UA: {ua}");
        }
    }

    #[test]
    fn pinned_agent_bypasses_the_pool() {
        let config = FetchConfig {
            user_agent: Some("SpecBot/1.0".into()),
            ..Default::default()
        };
        assert_eq!(user_agent_for(&config), "SpecBot/1.0");
    }

    #[test]
    fn accept_language_includes_bare_language_fallback() {
        let value = accept_language("en-US").expect("valid locale");
        assert_eq!(value.to_str().unwrap(), "en-US,en;q=0.8");

        let value = accept_language("de").expect("valid locale");
        assert_eq!(value.to_str().unwrap(), "de,de;q=0.8");
    }

    #[test]
    fn accept_language_rejects_unprintable_locale() {
        assert!(accept_language("en\nUS").is_err());
    }

    #[test]
    fn backstop_outlives_the_attempt_deadline() {
        let config = FetchConfig::default();
        assert!(backstop_timeout(&config) > Duration::from_millis(config.attempt_timeout_ms));
    }

    #[test]
    fn client_builds_for_default_and_pinned_configs() {
        assert!(build_client(&FetchConfig::default()).is_ok());

        let pinned = FetchConfig {
            user_agent: Some("SpecBot/1.0".into()),
            locale: "de-DE".into(),
            ..Default::default()
        };
        assert!(build_client(&pinned).is_ok());
    }
}
