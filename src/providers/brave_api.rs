//! Brave Search API provider — the primary retrieval tier.
//!
//! Authenticated JSON web search with a subscription token header. The
//! response is deserialised against a strict schema: a shape mismatch
//! fails closed to an empty result for that query variant rather than
//! propagating malformed data.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::http;
use crate::provider::{assemble_result, SpecProvider};
use crate::retry::RetryExecutor;
use crate::types::{ProviderResult, ResultItem, SpecQuery};

const PROVIDER_NAME: &str = "BraveApi";
const ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

/// Primary search tier backed by the Brave Search API.
pub struct BraveApiProvider {
    client: reqwest::Client,
    executor: RetryExecutor,
    api_key: String,
    result_count: usize,
    country: String,
    search_lang: String,
}

impl BraveApiProvider {
    /// Build the provider. Requires an API key; without one the
    /// orchestrator skips this tier entirely.
    pub fn new(config: &FetchConfig, executor: RetryExecutor, api_key: String) -> Result<Self> {
        let (lang, country) = split_locale(&config.locale);
        Ok(Self {
            client: http::build_client(config)?,
            executor,
            api_key,
            result_count: config.result_count,
            country,
            search_lang: lang,
        })
    }

    /// Query phrasing strategies for this tier. A plain spec lookup plus a
    /// question-style phrasing that surfaces owner-resource pages.
    fn variants(query: &SpecQuery) -> Vec<String> {
        let subject = query.subject.to_string();
        let fields = query
            .fields
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(" ");
        vec![
            format!("{subject} {fields} specification"),
            format!("what is the {fields} for a {subject}"),
        ]
    }

    /// Execute one query variant through the retry executor and parse the
    /// response body.
    async fn search_variant(&self, phrase: &str) -> Result<Vec<ResultItem>> {
        let body = self
            .executor
            .execute(|| {
                let client = self.client.clone();
                let key = self.api_key.clone();
                let count = self.result_count.to_string();
                let country = self.country.clone();
                let lang = self.search_lang.clone();
                let phrase = phrase.to_string();
                async move {
                    let response = client
                        .get(ENDPOINT)
                        .query(&[
                            ("q", phrase.as_str()),
                            ("count", count.as_str()),
                            ("country", country.as_str()),
                            ("search_lang", lang.as_str()),
                        ])
                        .header("X-Subscription-Token", key)
                        .header("Accept", "application/json")
                        .send()
                        .await
                        .map_err(|e| FetchError::Network(format!("request failed: {e}")))?;

                    let status = response.status().as_u16();
                    if !(200..300).contains(&status) {
                        return Err(FetchError::from_status(status));
                    }

                    response
                        .text()
                        .await
                        .map_err(|e| FetchError::Network(format!("response read failed: {e}")))
                }
            })
            .await?;

        parse_response(&body)
    }
}

#[async_trait]
impl SpecProvider for BraveApiProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn search(&self, query: &SpecQuery) -> Result<ProviderResult> {
        let mut items = Vec::new();
        for phrase in Self::variants(query) {
            tracing::trace!(%phrase, "BraveApi variant");
            match self.search_variant(&phrase).await {
                Ok(variant_items) => items.extend(variant_items),
                // A failed variant never aborts the provider.
                Err(err) => tracing::warn!(%phrase, error = %err, "BraveApi variant failed"),
            }
        }
        let mut result = assemble_result(PROVIDER_NAME, items);
        result.items.truncate(self.result_count);
        tracing::debug!(count = result.items.len(), "BraveApi results");
        Ok(result)
    }
}

/// Strict response schema: anything that does not match fails closed.
#[derive(Debug, Deserialize)]
struct BraveResponse {
    web: BraveWeb,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveWebItem>,
}

#[derive(Debug, Deserialize)]
struct BraveWebItem {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

/// Parse a Brave API response body into result items.
pub(crate) fn parse_response(body: &str) -> Result<Vec<ResultItem>> {
    let parsed: BraveResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("unexpected response shape: {e}")))?;
    Ok(parsed
        .web
        .results
        .into_iter()
        .map(|item| ResultItem {
            title: item.title,
            url: item.url,
            snippet: item.description,
        })
        .collect())
}

/// Split an `ll-CC` locale into (search language, country), defaulting to
/// `("en", "US")` for anything unexpected.
fn split_locale(locale: &str) -> (String, String) {
    let mut parts = locale.split('-');
    let lang = parts.next().filter(|p| !p.is_empty()).unwrap_or("en");
    let country = parts.next().filter(|p| !p.is_empty()).unwrap_or("US");
    (lang.to_lowercase(), country.to_uppercase())
}
