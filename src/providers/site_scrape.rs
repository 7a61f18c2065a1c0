//! Allow-list page scraping — the last-resort retrieval tier.
//!
//! Instead of querying a search index, this tier fetches a small fixed set
//! of candidate pages on authoritative domains (manufacturer sites,
//! Wikipedia), strips the markup, and returns the readable text as result
//! snippets. Every fetch still goes through the retry executor.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};

use crate::config::FetchConfig;
use crate::domains::{self, DomainClass};
use crate::error::{FetchError, Result};
use crate::http;
use crate::provider::{assemble_result, SpecProvider};
use crate::retry::RetryExecutor;
use crate::types::{ProviderResult, ResultItem, SpecQuery};

const PROVIDER_NAME: &str = "SiteScrape";

/// Maximum characters of page text kept per snippet.
const SNIPPET_CHARS: usize = 400;

/// Last-resort tier scraping a fixed allow-list of authoritative pages.
pub struct SiteScrapeProvider {
    client: reqwest::Client,
    executor: RetryExecutor,
}

impl SiteScrapeProvider {
    /// Build the provider.
    pub fn new(config: &FetchConfig, executor: RetryExecutor) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config)?,
            executor,
        })
    }

    /// Candidate pages for this subject, restricted to domains the trust
    /// registry does not classify as generic. Unknown brands produce only
    /// the Wikipedia candidate.
    fn candidate_urls(query: &SpecQuery) -> Vec<String> {
        let brand_slug = slug(&query.subject.brand);
        let model_slug = slug(&query.subject.model);
        let wiki_title = format!(
            "{}_{}",
            title_case(&query.subject.brand),
            title_case(&query.subject.model)
        );

        let candidates = [
            format!("https://en.wikipedia.org/wiki/{wiki_title}"),
            format!("https://www.{brand_slug}.com/{model_slug}/"),
        ];

        candidates
            .into_iter()
            .filter(|url| {
                domains::domain_of(url)
                    .map(|d| domains::classify(&d) != DomainClass::Generic)
                    .unwrap_or(false)
            })
            .collect()
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.executor
            .execute(|| {
                let client = self.client.clone();
                let url = url.to_string();
                async move {
                    let response = client
                        .get(&url)
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
            .await
    }
}

#[async_trait]
impl SpecProvider for SiteScrapeProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn search(&self, query: &SpecQuery) -> Result<ProviderResult> {
        let keywords: Vec<&'static str> = query.fields.iter().flat_map(|f| f.name().split(' ')).collect();

        let mut items = Vec::new();
        for url in Self::candidate_urls(query) {
            tracing::trace!(%url, "scraping candidate page");
            let html = match self.fetch_page(&url).await {
                Ok(html) => html,
                Err(err) => {
                    tracing::warn!(%url, error = %err, "candidate fetch failed");
                    continue;
                }
            };
            match page_to_item(&html, &url, &keywords) {
                Some(item) => items.push(item),
                None => tracing::debug!(%url, "no readable content on candidate page"),
            }
        }

        let result = assemble_result(PROVIDER_NAME, items);
        tracing::debug!(count = result.items.len(), "SiteScrape results");
        Ok(result)
    }
}

/// Convert a fetched page into a result item: extract the title and body
/// text, then snip a window of text around the first field keyword.
///
/// Returns `None` if the page has no readable text.
fn page_to_item(html: &str, url: &str, keywords: &[&str]) -> Option<ResultItem> {
    let stripped = strip_boilerplate(html);
    let document = Html::parse_document(&stripped);

    let title = select_text(&document, "title").unwrap_or_default();
    let text = ["article", "main", "body"]
        .iter()
        .find_map(|sel| select_text(&document, sel))?;
    let text = collapse_whitespace(&text);
    if text.is_empty() {
        return None;
    }

    Some(ResultItem {
        title,
        url: url.to_string(),
        snippet: keyword_window(&text, keywords, SNIPPET_CHARS),
    })
}

/// Collect the text of the first element matching `selector`, trimmed.
fn select_text(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let element = document.select(&sel).next()?;
    let text = element.text().collect::<Vec<_>>().join(" ");
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Remove non-content elements (scripts, styles, navigation, chrome)
/// including their contents, before handing the page to the parser.
fn strip_boilerplate(html: &str) -> String {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        ["script", "style", "nav", "footer", "header", "aside", "noscript", "svg", "iframe"]
            .iter()
            .map(|tag| {
                Regex::new(&format!(r"(?is)<{tag}\b.*?</{tag}\s*>"))
                    .expect("boilerplate pattern is valid")
            })
            .collect()
    });

    let mut text = html.to_string();
    for pattern in patterns {
        text = pattern.replace_all(&text, " ").into_owned();
    }
    text
}

/// Collapse whitespace runs into single spaces.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Take up to `max_chars` of text centred on the first keyword occurrence,
/// or the leading text when no keyword matches.
fn keyword_window(text: &str, keywords: &[&str], max_chars: usize) -> String {
    let hit = keywords
        .iter()
        .filter_map(|kw| find_ignore_ascii_case(text, kw))
        .min();

    let start = match hit {
        Some(pos) => floor_char_boundary(text, pos.saturating_sub(max_chars / 4)),
        None => 0,
    };
    let end = floor_char_boundary(text, (start + max_chars).min(text.len()));
    text[start..end].trim().to_string()
}

/// Byte offset of the first ASCII-case-insensitive occurrence of `needle`
/// in `haystack`. Searching the original text keeps the offset valid for
/// slicing; Unicode lowercasing can change byte lengths, so offsets found
/// in a lowercased copy would not be.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Lowercase alphanumeric slug for URL path segments.
fn slug(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// First letter uppercased, rest lowercased, spaces replaced with `_`.
fn title_case(text: &str) -> String {
    text.trim()
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldKind, Subject};

    #[test]
    fn candidates_include_wikipedia_and_known_brand_site() {
        let query = SpecQuery::new(
            Subject::new("Toyota", "Camry", Some(2020)),
            [FieldKind::OilCapacity],
        );
        let urls = SiteScrapeProvider::candidate_urls(&query);
        assert!(urls.contains(&"https://en.wikipedia.org/wiki/Toyota_Camry".to_string()));
        assert!(urls.contains(&"https://www.toyota.com/camry/".to_string()));
    }

    #[test]
    fn candidates_drop_unknown_brand_sites() {
        let query = SpecQuery::new(
            Subject::new("Zorblax", "Quasar", None),
            [FieldKind::OilCapacity],
        );
        let urls = SiteScrapeProvider::candidate_urls(&query);
        // Only the Wikipedia candidate survives the allow-list filter.
        assert_eq!(urls, vec!["https://en.wikipedia.org/wiki/Zorblax_Quasar".to_string()]);
    }

    #[test]
    fn page_to_item_extracts_title_and_keyword_window() {
        let html = r#"<html>
            <head><title>Toyota Camry - Wikipedia</title></head>
            <body>
                <nav>Jump to content</nav>
                <main>
                    <p>The Toyota Camry is a mid-size sedan.</p>
                    <p>The 2.5L engine takes 4.8 quarts of 0W-16 oil capacity with filter.</p>
                </main>
                <footer>Footer links</footer>
            </body>
        </html>"#;
        let item = page_to_item(html, "https://en.wikipedia.org/wiki/Toyota_Camry", &["oil", "capacity"])
            .expect("should extract");
        assert_eq!(item.title, "Toyota Camry - Wikipedia");
        assert!(item.snippet.contains("4.8 quarts"), "snippet: {}", item.snippet);
        assert!(!item.snippet.contains("Jump to content"));
        assert!(!item.snippet.contains("Footer links"));
    }

    #[test]
    fn page_to_item_none_for_empty_page() {
        assert!(page_to_item("<html><body>   </body></html>", "https://x.com", &["oil"]).is_none());
    }

    #[test]
    fn strip_boilerplate_removes_tag_contents() {
        let html = "<body><script>var x = 'oil';</script><p>real capacity text</p><style>.a{}</style></body>";
        let stripped = strip_boilerplate(html);
        assert!(!stripped.contains("var x"));
        assert!(stripped.contains("real capacity text"));
    }

    #[test]
    fn keyword_window_centres_on_first_hit() {
        let filler = "lorem ipsum ".repeat(100);
        let text = format!("{filler}oil capacity is 4.8 quarts here{filler}");
        let window = keyword_window(&text, &["capacity"], 120);
        assert!(window.contains("4.8 quarts"));
        assert!(window.len() <= 120);
    }

    #[test]
    fn keyword_window_falls_back_to_leading_text() {
        let text = "no relevant terms in this page at all ".repeat(20);
        let window = keyword_window(&text, &["viscosity"], 50);
        assert!(window.starts_with("no relevant terms"));
        assert!(window.len() <= 50);
    }

    #[test]
    fn keyword_window_survives_length_changing_lowercase() {
        // 'İ' grows from two to three bytes under Unicode lowercasing, so
        // an offset found in a lowercased copy would overshoot here.
        let filler = "İstanbul ".repeat(40);
        let text = format!("{filler}Oil capacity 4.8 quarts with filter.");
        let window = keyword_window(&text, &["capacity"], 60);
        assert!(window.contains("4.8 quarts"), "window: {window}");
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let text = "header text CAPACITY: 4.8 quarts trailing";
        let window = keyword_window(text, &["capacity"], 40);
        assert!(window.contains("4.8 quarts"), "window: {window}");
    }

    #[test]
    fn keyword_window_respects_char_boundaries() {
        let text = "é".repeat(300);
        let window = keyword_window(&text, &["oil"], 101);
        // Must not panic and must stay within the limit.
        assert!(window.len() <= 101);
    }

    #[test]
    fn slug_and_title_case() {
        assert_eq!(slug("Alfa Romeo"), "alfaromeo");
        assert_eq!(title_case("alfa romeo"), "Alfa_Romeo");
        assert_eq!(title_case("CAMRY"), "Camry");
    }
}
