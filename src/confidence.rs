//! Confidence grading for retrieved result sets.
//!
//! A single provider result is graded from its item count and how many of
//! its source domains the trust registry classifies as authoritative. When
//! a query spans several fact categories, the per-category grades are
//! folded with an asymmetric rule that requires corroboration before
//! trusting a single noisy source.

use crate::config::ConfidenceThresholds;
use crate::domains::{self, DomainClass};
use crate::types::{ConfidenceLevel, ProviderResult};

/// Grades result sets against configurable thresholds.
///
/// The thresholds are tuning knobs rather than invariants, so they live in
/// [`ConfidenceThresholds`] instead of being hardcoded here.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    thresholds: ConfidenceThresholds,
}

impl ConfidenceScorer {
    /// Build a scorer with the given thresholds.
    pub fn new(thresholds: ConfidenceThresholds) -> Self {
        Self { thresholds }
    }

    /// Grade one provider result.
    ///
    /// `High` needs at least `min_authoritative_high` authoritative source
    /// domains and `min_items_high` distinct items; `Medium` needs
    /// `min_items_medium` distinct items; anything less, including an empty
    /// result, is `Low`.
    pub fn score(&self, result: &ProviderResult) -> ConfidenceLevel {
        let authoritative = result
            .source_domains
            .iter()
            .filter(|domain| domains::classify(domain) == DomainClass::Authoritative)
            .count();
        let items = result.items.len();

        let level = if authoritative >= self.thresholds.min_authoritative_high
            && items >= self.thresholds.min_items_high
        {
            ConfidenceLevel::High
        } else if items >= self.thresholds.min_items_medium {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };

        tracing::debug!(
            provider = %result.provider,
            items,
            authoritative,
            confidence = %level,
            "scored provider result"
        );
        level
    }

    /// Fold per-category grades into one overall grade.
    ///
    /// `High` needs two `High` categories; a single `High`, or two
    /// `Medium`s, yields `Medium`; everything else is `Low`. One strong
    /// category alone is deliberately not enough for `High`.
    pub fn aggregate(&self, levels: &[ConfidenceLevel]) -> ConfidenceLevel {
        let high = levels
            .iter()
            .filter(|l| **l == ConfidenceLevel::High)
            .count();
        let medium = levels
            .iter()
            .filter(|l| **l == ConfidenceLevel::Medium)
            .count();

        if high >= 2 {
            ConfidenceLevel::High
        } else if high >= 1 || medium >= 2 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(ConfidenceThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultItem;
    use std::collections::BTreeSet;

    fn result_with(urls: &[&str]) -> ProviderResult {
        let items = urls
            .iter()
            .map(|url| ResultItem {
                title: "t".into(),
                url: (*url).to_string(),
                snippet: String::new(),
            })
            .collect::<Vec<_>>();
        let source_domains: BTreeSet<String> = urls
            .iter()
            .filter_map(|url| crate::domains::domain_of(url))
            .collect();
        ProviderResult {
            items,
            source_domains,
            provider: "Test".into(),
        }
    }

    #[test]
    fn one_authoritative_plus_two_generic_is_high() {
        let result = result_with(&[
            "https://www.toyota.com/camry/specs",
            "https://random-blog.example.com/oil",
            "https://another.example.org/camry",
        ]);
        assert_eq!(
            ConfidenceScorer::default().score(&result),
            ConfidenceLevel::High
        );
    }

    #[test]
    fn three_generic_items_is_medium() {
        let result = result_with(&[
            "https://a.example.com/1",
            "https://b.example.com/2",
            "https://c.example.com/3",
        ]);
        assert_eq!(
            ConfidenceScorer::default().score(&result),
            ConfidenceLevel::Medium
        );
    }

    #[test]
    fn two_items_with_authoritative_is_only_medium() {
        // Authoritative source present but below the item floor for High.
        let result = result_with(&[
            "https://www.toyota.com/camry/specs",
            "https://a.example.com/1",
        ]);
        assert_eq!(
            ConfidenceScorer::default().score(&result),
            ConfidenceLevel::Medium
        );
    }

    #[test]
    fn single_item_is_low() {
        let result = result_with(&["https://www.toyota.com/camry/specs"]);
        assert_eq!(
            ConfidenceScorer::default().score(&result),
            ConfidenceLevel::Low
        );
    }

    #[test]
    fn empty_result_is_low() {
        assert_eq!(
            ConfidenceScorer::default().score(&ProviderResult::empty("Test")),
            ConfidenceLevel::Low
        );
    }

    #[test]
    fn thresholds_are_configurable() {
        let relaxed = ConfidenceScorer::new(ConfidenceThresholds {
            min_authoritative_high: 1,
            min_items_high: 1,
            min_items_medium: 1,
        });
        let result = result_with(&["https://www.toyota.com/camry/specs"]);
        assert_eq!(relaxed.score(&result), ConfidenceLevel::High);
    }

    #[test]
    fn aggregate_two_highs_is_high() {
        let scorer = ConfidenceScorer::default();
        assert_eq!(
            scorer.aggregate(&[ConfidenceLevel::High, ConfidenceLevel::High]),
            ConfidenceLevel::High
        );
        assert_eq!(
            scorer.aggregate(&[
                ConfidenceLevel::High,
                ConfidenceLevel::Low,
                ConfidenceLevel::High
            ]),
            ConfidenceLevel::High
        );
    }

    #[test]
    fn aggregate_single_high_is_medium() {
        let scorer = ConfidenceScorer::default();
        assert_eq!(
            scorer.aggregate(&[ConfidenceLevel::High]),
            ConfidenceLevel::Medium
        );
        assert_eq!(
            scorer.aggregate(&[ConfidenceLevel::High, ConfidenceLevel::Low]),
            ConfidenceLevel::Medium
        );
    }

    #[test]
    fn aggregate_two_mediums_is_medium() {
        let scorer = ConfidenceScorer::default();
        assert_eq!(
            scorer.aggregate(&[ConfidenceLevel::Medium, ConfidenceLevel::Medium]),
            ConfidenceLevel::Medium
        );
    }

    #[test]
    fn aggregate_weak_inputs_are_low() {
        let scorer = ConfidenceScorer::default();
        assert_eq!(scorer.aggregate(&[]), ConfidenceLevel::Low);
        assert_eq!(
            scorer.aggregate(&[ConfidenceLevel::Low, ConfidenceLevel::Low]),
            ConfidenceLevel::Low
        );
        assert_eq!(
            scorer.aggregate(&[ConfidenceLevel::Medium]),
            ConfidenceLevel::Low
        );
    }

    #[test]
    fn aggregate_never_below_implied_trust_of_minimum() {
        // Any pair containing a High is at least Medium.
        let scorer = ConfidenceScorer::default();
        for other in [
            ConfidenceLevel::Low,
            ConfidenceLevel::Medium,
            ConfidenceLevel::High,
        ] {
            assert!(
                scorer.aggregate(&[ConfidenceLevel::High, other]) >= ConfidenceLevel::Medium
            );
        }
    }
}
