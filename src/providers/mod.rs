//! Provider adapter implementations, ordered by decreasing reliability.
//!
//! Each module provides a struct implementing
//! [`crate::provider::SpecProvider`]: the paid Brave Search API, the free
//! DuckDuckGo HTML fallback, and last-resort scraping of a fixed
//! allow-list of authoritative pages.

pub mod brave_api;
pub mod duckduckgo;
pub mod site_scrape;

pub use brave_api::BraveApiProvider;
pub use duckduckgo::DuckDuckGoProvider;
pub use site_scrape::SiteScrapeProvider;
