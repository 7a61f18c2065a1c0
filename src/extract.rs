//! Structured fact extraction from free-text result snippets.
//!
//! Each field kind carries a small ordered set of regex rules run against
//! `title + snippet` of every result item. Matches outside a sanity range
//! are discarded, the survivors are stamped with the source domain's trust
//! weight, and the list is sorted by that weight so the first distinct
//! value per field is the canonical one. All candidates are retained for
//! audit.

use std::sync::OnceLock;

use regex::Regex;

use crate::domains;
use crate::types::{ExtractedFact, FieldKind, ResultItem};

/// Plausible engine oil capacity in quarts.
const CAPACITY_RANGE: (f64, f64) = (2.0, 20.0);
/// Plausible drain plug torque in ft-lb.
const TORQUE_RANGE: (f64, f64) = (10.0, 60.0);

/// Pulls typed facts out of free-text result items.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredExtractor;

impl StructuredExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract all plausible facts of `field` from `items`, sorted by
    /// source reliability descending. Ties keep provider order, so the
    /// first element is always the canonical candidate.
    pub fn extract(&self, items: &[ResultItem], field: FieldKind) -> Vec<ExtractedFact> {
        let mut facts: Vec<ExtractedFact> = items
            .iter()
            .flat_map(|item| facts_from_item(item, field))
            .collect();
        facts.sort_by(|a, b| b.reliability.cmp(&a.reliability));
        tracing::debug!(field = %field, count = facts.len(), "extracted facts");
        facts
    }

    /// The highest-reliability fact for `field`, if any was extracted.
    pub fn canonical<'a>(&self, facts: &'a [ExtractedFact], field: FieldKind) -> Option<&'a ExtractedFact> {
        facts.iter().find(|fact| fact.field == field)
    }
}

fn facts_from_item(item: &ResultItem, field: FieldKind) -> Vec<ExtractedFact> {
    let text = format!("{} {}", item.title, item.snippet);
    let domain = domains::domain_of(&item.url).unwrap_or_default();
    let reliability = domains::domain_score(&item.url);

    matches_for_field(&text, field)
        .into_iter()
        .map(|(value, unit)| ExtractedFact {
            field,
            value,
            unit,
            engine_context: engine_context(&text),
            source_domain: domain.clone(),
            source_url: item.url.clone(),
            reliability,
        })
        .collect()
}

/// Run the field's pattern rules over `text`, returning `(value, unit)`
/// pairs that pass the sanity range for that field.
fn matches_for_field(text: &str, field: FieldKind) -> Vec<(String, Option<String>)> {
    match field {
        FieldKind::OilCapacity => capacity_pattern()
            .captures_iter(text)
            .filter_map(|cap| {
                let value = cap.get(1)?.as_str();
                let unit = normalise_capacity_unit(cap.get(2)?.as_str());
                let quarts = to_quarts(value.parse().ok()?, &unit)?;
                in_range(quarts, CAPACITY_RANGE)
                    .then(|| (value.to_string(), Some(unit)))
            })
            .collect(),
        FieldKind::Viscosity => viscosity_pattern()
            .find_iter(text)
            .map(|m| (m.as_str().to_uppercase(), None))
            .collect(),
        FieldKind::OilFilter => filter_pattern()
            .captures_iter(text)
            .filter_map(|cap| cap.get(1).map(|m| (m.as_str().to_string(), None)))
            .collect(),
        FieldKind::DrainPlugTorque => torque_pattern()
            .captures_iter(text)
            .filter_map(|cap| {
                let value = cap.get(1)?.as_str();
                let unit = normalise_torque_unit(cap.get(2)?.as_str());
                let ft_lb = to_ft_lb(value.parse().ok()?, &unit)?;
                in_range(ft_lb, TORQUE_RANGE).then(|| (value.to_string(), Some(unit)))
            })
            .collect(),
    }
}

/// Engine descriptors near the fact, e.g. "2.5L" or "V6".
fn engine_context(text: &str) -> Vec<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(\d\.\d\s?L|V[68]|I[346]|inline-\d|turbo)\b")
            .expect("engine context pattern is valid")
    });
    let mut seen = Vec::new();
    for m in pattern.find_iter(text) {
        let token = m.as_str().to_uppercase().replace(' ', "");
        if !seen.contains(&token) {
            seen.push(token);
        }
    }
    seen
}

fn capacity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2}(?:\.\d{1,2})?)\s?(quarts?|qts?|liters?|litres?|l)\b")
            .expect("capacity pattern is valid")
    })
}

fn viscosity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b\d{1,2}W-\d{2}\b").expect("viscosity pattern is valid")
    })
}

fn filter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Part numbers like "90915-YZZF1" or "PH7317", introduced by a
        // filter-related token to avoid matching arbitrary codes.
        Regex::new(r"(?i)filter\D{0,20}\b([A-Z0-9]{2,7}-?[A-Z0-9]{3,8})\b")
            .expect("filter pattern is valid")
    })
}

fn torque_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,3}(?:\.\d)?)\s?(ft-?\.?\s?lbs?|lb-?\.?\s?ft|n[·\-]?m)\b")
            .expect("torque pattern is valid")
    })
}

fn normalise_capacity_unit(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.starts_with('q') {
        "quarts".to_string()
    } else {
        "liters".to_string()
    }
}

fn normalise_torque_unit(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.starts_with('n') {
        "Nm".to_string()
    } else {
        "ft-lb".to_string()
    }
}

fn to_quarts(value: f64, unit: &str) -> Option<f64> {
    match unit {
        "quarts" => Some(value),
        "liters" => Some(value * 1.057),
        _ => None,
    }
}

fn to_ft_lb(value: f64, unit: &str) -> Option<f64> {
    match unit {
        "ft-lb" => Some(value),
        "Nm" => Some(value * 0.7376),
        _ => None,
    }
}

fn in_range(value: f64, (min, max): (f64, f64)) -> bool {
    (min..=max).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: &str, snippet: &str) -> ResultItem {
        ResultItem {
            title: String::new(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }

    #[test]
    fn extracts_capacity_with_unit() {
        let items = [item(
            "https://www.toyota.com/camry",
            "Engine oil capacity with filter: 4.8 quarts (4.5 liters).",
        )];
        let facts = StructuredExtractor::new().extract(&items, FieldKind::OilCapacity);
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].value, "4.8");
        assert_eq!(facts[0].unit.as_deref(), Some("quarts"));
        assert_eq!(facts[1].unit.as_deref(), Some("liters"));
        assert_eq!(facts[0].source_domain, "toyota.com");
        assert_eq!(facts[0].reliability, 90);
    }

    #[test]
    fn discards_implausible_capacity() {
        let items = [item(
            "https://example.com/x",
            "This article has 120 quarts of nonsense and 0.1 liters of oil.",
        )];
        let facts = StructuredExtractor::new().extract(&items, FieldKind::OilCapacity);
        assert!(facts.is_empty());
    }

    #[test]
    fn extracts_viscosity_grade() {
        let items = [item(
            "https://bobistheoilguy.com/forums/x",
            "Most owners run 0w-20 synthetic in these engines.",
        )];
        let facts = StructuredExtractor::new().extract(&items, FieldKind::Viscosity);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].value, "0W-20");
        assert!(facts[0].unit.is_none());
        assert_eq!(facts[0].reliability, 60);
    }

    #[test]
    fn extracts_filter_part_number() {
        let items = [item(
            "https://example.com/parts",
            "OEM oil filter part number 90915-YZZF1 fits this engine.",
        )];
        let facts = StructuredExtractor::new().extract(&items, FieldKind::OilFilter);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].value, "90915-YZZF1");
    }

    #[test]
    fn extracts_torque_in_both_units() {
        let items = [item(
            "https://example.com/torque",
            "Tighten the drain plug to 30 ft-lb (41 Nm).",
        )];
        let facts = StructuredExtractor::new().extract(&items, FieldKind::DrainPlugTorque);
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].value, "30");
        assert_eq!(facts[0].unit.as_deref(), Some("ft-lb"));
        assert_eq!(facts[1].unit.as_deref(), Some("Nm"));
    }

    #[test]
    fn discards_implausible_torque() {
        let items = [item("https://example.com/x", "Torque spec: 500 ft-lb.")];
        let facts = StructuredExtractor::new().extract(&items, FieldKind::DrainPlugTorque);
        assert!(facts.is_empty());
    }

    #[test]
    fn ranks_by_reliability_and_keeps_all_candidates() {
        let items = [
            item("https://random-forum.example.com/a", "Oil capacity is 5.0 quarts."),
            item("https://www.toyota.com/camry/specs", "Oil capacity: 4.8 quarts."),
        ];
        let extractor = StructuredExtractor::new();
        let facts = extractor.extract(&items, FieldKind::OilCapacity);
        // Both conflicting values retained, authoritative one first.
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].value, "4.8");
        assert_eq!(facts[0].reliability, 90);
        assert_eq!(facts[1].value, "5.0");
        assert_eq!(facts[1].reliability, 30);

        let canonical = extractor
            .canonical(&facts, FieldKind::OilCapacity)
            .expect("has canonical");
        assert_eq!(canonical.value, "4.8");
    }

    #[test]
    fn stable_order_for_equal_reliability() {
        let items = [
            item("https://a.example.com/1", "Capacity 4.4 quarts."),
            item("https://b.example.com/2", "Capacity 4.6 quarts."),
        ];
        let facts = StructuredExtractor::new().extract(&items, FieldKind::OilCapacity);
        assert_eq!(facts[0].value, "4.4");
        assert_eq!(facts[1].value, "4.6");
    }

    #[test]
    fn engine_context_captured() {
        let items = [item(
            "https://www.toyota.com/camry",
            "The 2.5L inline-4 takes 4.8 quarts; the 3.5L V6 takes 5.8 quarts.",
        )];
        let facts = StructuredExtractor::new().extract(&items, FieldKind::OilCapacity);
        assert!(!facts.is_empty());
        assert!(facts[0].engine_context.contains(&"2.5L".to_string()));
        assert!(facts[0].engine_context.contains(&"V6".to_string()));
    }

    #[test]
    fn no_match_yields_empty() {
        let items = [item("https://example.com/x", "Nothing useful here.")];
        let extractor = StructuredExtractor::new();
        assert!(extractor.extract(&items, FieldKind::OilCapacity).is_empty());
        assert!(extractor.extract(&items, FieldKind::Viscosity).is_empty());
        assert!(extractor
            .canonical(&[], FieldKind::OilCapacity)
            .is_none());
    }
}
