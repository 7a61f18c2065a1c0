//! Source-domain trust registry shared by the confidence scorer and the
//! structured extractor.
//!
//! Domains are classified into three tiers: authoritative (manufacturer and
//! recognised lubricant-reference sites), community (enthusiast forums and
//! reference wikis), and generic (everything else). Classification is by
//! suffix match so `www.toyota.com` and `pressroom.toyota.com` both count
//! as `toyota.com`.

use url::Url;

/// Reliability score stamped on facts from authoritative domains.
pub const SCORE_AUTHORITATIVE: u8 = 90;
/// Reliability score for known community/reference domains.
pub const SCORE_COMMUNITY: u8 = 60;
/// Default reliability score for unrecognised domains.
pub const SCORE_GENERIC: u8 = 30;

/// Manufacturer and recognised reference sites.
const AUTHORITATIVE_DOMAINS: &[&str] = &[
    "toyota.com",
    "honda.com",
    "ford.com",
    "chevrolet.com",
    "nissanusa.com",
    "subaru.com",
    "hyundaiusa.com",
    "kia.com",
    "vw.com",
    "bmwusa.com",
    "mbusa.com",
    "mazdausa.com",
    "mobil.com",
    "valvoline.com",
    "castrol.com",
    "pennzoil.com",
];

/// Enthusiast forums and community reference sites.
const COMMUNITY_DOMAINS: &[&str] = &[
    "bobistheoilguy.com",
    "reddit.com",
    "toyotanation.com",
    "hondacivicforum.com",
    "f150forum.com",
    "wikipedia.org",
];

/// Trust tier of a source domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainClass {
    /// Manufacturer or recognised reference site.
    Authoritative,
    /// Known community or forum site.
    Community,
    /// Anything else.
    Generic,
}

/// Classify a bare domain (no scheme) into its trust tier.
pub fn classify(domain: &str) -> DomainClass {
    let domain = domain.to_lowercase();
    if matches_any(&domain, AUTHORITATIVE_DOMAINS) {
        DomainClass::Authoritative
    } else if matches_any(&domain, COMMUNITY_DOMAINS) {
        DomainClass::Community
    } else {
        DomainClass::Generic
    }
}

/// Reliability score for a source URL, used to rank extracted facts.
pub fn domain_score(url: &str) -> u8 {
    match domain_of(url).as_deref().map(classify) {
        Some(DomainClass::Authoritative) => SCORE_AUTHORITATIVE,
        Some(DomainClass::Community) => SCORE_COMMUNITY,
        _ => SCORE_GENERIC,
    }
}

/// Extract the host domain from a URL, stripping a leading `www.`.
///
/// Returns `None` if the input is not a parseable URL with a host.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

fn matches_any(domain: &str, list: &[&str]) -> bool {
    list.iter()
        .any(|known| domain == *known || domain.ends_with(&format!(".{known}")))
}
