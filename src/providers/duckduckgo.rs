//! DuckDuckGo HTML provider — the free fallback tier.
//!
//! Scrapes the JavaScript-free endpoint at `html.duckduckgo.com/html/`.
//! No API key and no quota, but lower result quality than the primary
//! tier, so it sits second in the fallback chain.

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::http;
use crate::provider::{assemble_result, SpecProvider};
use crate::retry::RetryExecutor;
use crate::types::{ProviderResult, ResultItem, SpecQuery};

const PROVIDER_NAME: &str = "DuckDuckGo";
const ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Free search tier scraping DuckDuckGo's HTML-only results page.
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    executor: RetryExecutor,
    result_count: usize,
}

impl DuckDuckGoProvider {
    /// Build the provider.
    pub fn new(config: &FetchConfig, executor: RetryExecutor) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config)?,
            executor,
            result_count: config.result_count,
        })
    }

    /// Query phrasings for this tier: a direct lookup and a forum-leaning
    /// phrasing that surfaces community answers.
    fn variants(query: &SpecQuery) -> Vec<String> {
        let subject = query.subject.to_string();
        let fields = query
            .fields
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(" ");
        vec![
            format!("{subject} {fields}"),
            format!("{subject} {fields} recommended"),
        ]
    }

    /// Unwrap DuckDuckGo's redirect links.
    ///
    /// Result anchors look like
    /// `//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com&rut=...`;
    /// the target lives URL-encoded in the `uddg` parameter.
    fn unwrap_redirect(href: &str) -> Option<String> {
        let absolute = if href.starts_with("//") {
            format!("https:{href}")
        } else {
            href.to_string()
        };
        let parsed = Url::parse(&absolute).ok()?;
        if parsed.host_str() == Some("duckduckgo.com") && parsed.path().starts_with("/l/") {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, value)| value.into_owned())
        } else {
            Some(absolute)
        }
    }

    async fn search_variant(&self, phrase: &str) -> Result<Vec<ResultItem>> {
        let html = self
            .executor
            .execute(|| {
                let client = self.client.clone();
                let phrase = phrase.to_string();
                async move {
                    let response = client
                        .post(ENDPOINT)
                        .form(&[("q", phrase.as_str())])
                        .header("Accept-Language", "en-US,en;q=0.9")
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

        tracing::trace!(bytes = html.len(), "DuckDuckGo response received");
        parse_results_page(&html, self.result_count)
    }
}

#[async_trait]
impl SpecProvider for DuckDuckGoProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn search(&self, query: &SpecQuery) -> Result<ProviderResult> {
        let mut items = Vec::new();
        for phrase in Self::variants(query) {
            tracing::trace!(%phrase, "DuckDuckGo variant");
            match self.search_variant(&phrase).await {
                Ok(variant_items) => items.extend(variant_items),
                Err(err) => tracing::warn!(%phrase, error = %err, "DuckDuckGo variant failed"),
            }
        }
        let mut result = assemble_result(PROVIDER_NAME, items);
        result.items.truncate(self.result_count);
        tracing::debug!(count = result.items.len(), "DuckDuckGo results");
        Ok(result)
    }
}

/// Parse a DuckDuckGo HTML results page. Split out for fixture testing.
pub(crate) fn parse_results_page(html: &str, max_results: usize) -> Result<Vec<ResultItem>> {
    let document = Html::parse_document(html);

    let result_sel = Selector::parse(
        ".result.results_links.results_links_deep:not(.result--ad), .web-result:not(.result--ad)",
    )
    .map_err(|e| FetchError::Parse(format!("invalid result selector: {e:?}")))?;
    let title_sel = Selector::parse(".result__a")
        .map_err(|e| FetchError::Parse(format!("invalid title selector: {e:?}")))?;
    let snippet_sel = Selector::parse(".result__snippet")
        .map_err(|e| FetchError::Parse(format!("invalid snippet selector: {e:?}")))?;

    let mut items = Vec::new();
    for element in document.select(&result_sel) {
        let Some(anchor) = element.select(&title_sel).next() else {
            continue;
        };
        let title = anchor.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = DuckDuckGoProvider::unwrap_redirect(href) else {
            continue;
        };
        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        items.push(ResultItem {
            title,
            url,
            snippet,
        });
        if items.len() >= max_results {
            break;
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldKind, Subject};

    const MOCK_HTML: &str = r#"<!DOCTYPE html>
<html>
<body>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.toyota.com%2Fcamry%2Fspecs&amp;rut=abc123">
        2020 Camry Specifications
    </a>
    <div class="result__snippet">
        Engine oil capacity with filter: 4.8 quarts. Recommended viscosity 0W-16.
    </div>
</div>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="https://bobistheoilguy.com/forums/camry-oil">
        Camry oil thread
    </a>
    <div class="result__snippet">
        Most owners run 0W-20 in older 2.5L engines.
    </div>
</div>
<div class="result results_links results_links_deep web-result result--ad">
    <a class="result__a" href="https://ads.example.com/oil-deals">
        (Ad) Cheap oil changes
    </a>
</div>
</body>
</html>"#;

    #[test]
    fn unwrap_redirect_extracts_target() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Ftoyota.com%2Fcamry&rut=xyz";
        assert_eq!(
            DuckDuckGoProvider::unwrap_redirect(href),
            Some("https://toyota.com/camry".to_string())
        );
    }

    #[test]
    fn unwrap_redirect_passes_direct_links() {
        assert_eq!(
            DuckDuckGoProvider::unwrap_redirect("https://example.com/page"),
            Some("https://example.com/page".to_string())
        );
    }

    #[test]
    fn unwrap_redirect_rejects_garbage() {
        assert!(DuckDuckGoProvider::unwrap_redirect("not-a-url").is_none());
    }

    #[test]
    fn parse_mock_page_unwraps_and_excludes_ads() {
        let items = parse_results_page(MOCK_HTML, 10).expect("should parse");
        assert_eq!(items.len(), 2, "ad result excluded");
        assert_eq!(items[0].url, "https://www.toyota.com/camry/specs");
        assert!(items[0].snippet.contains("4.8 quarts"));
        assert_eq!(items[1].url, "https://bobistheoilguy.com/forums/camry-oil");
    }

    #[test]
    fn parse_respects_max_results() {
        let items = parse_results_page(MOCK_HTML, 1).expect("should parse");
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn parse_empty_page_returns_empty() {
        let items = parse_results_page("<html><body></body></html>", 10).expect("should parse");
        assert!(items.is_empty());
    }

    #[test]
    fn variants_include_subject() {
        let query = SpecQuery::new(
            Subject::new("Honda", "Civic", Some(2019)),
            [FieldKind::Viscosity],
        );
        let variants = DuckDuckGoProvider::variants(&query);
        assert_eq!(variants.len(), 2);
        assert!(variants.iter().all(|v| v.contains("2019 Honda Civic")));
        assert!(variants.iter().all(|v| v.contains("oil viscosity")));
    }
}
