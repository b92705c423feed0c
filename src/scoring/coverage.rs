//! Coverage scoring
//!
//! A rule earns `coverage × points`, where coverage is the weighted share of
//! its targets that passed. A rule that detects no targets has nothing to
//! fix and earns full credit.

use crate::document::Document;
use crate::models::{Category, Finding};
use crate::rules::{Rule, RuleOutcome, Target};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Relative importance of one target within a rule
pub trait TargetWeighting: Send + Sync {
    fn weight(&self, rule: &Rule, target: &Target, doc: &Document) -> f64;
}

/// Every target counts the same
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformWeighting;

impl TargetWeighting for UniformWeighting {
    fn weight(&self, _rule: &Rule, _target: &Target, _doc: &Document) -> f64 {
        1.0
    }
}

/// Score earned by one rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleScore {
    pub rule_id: String,
    pub name: String,
    pub category: Category,
    /// Points available
    pub max_score: f64,
    /// Weighted pass ratio in [0, 1]
    pub coverage: f64,
    /// Points earned, in [0, max_score]
    pub score: f64,
    pub targets_checked: usize,
    pub targets_passed: usize,
    /// False when the rule found nothing to check
    pub applicable: bool,
    pub faulted: bool,
    pub findings: Vec<Finding>,
    /// Notes left by the adjuster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adjustments: Vec<String>,
}

/// Turns rule outcomes into rule scores
#[derive(Clone)]
pub struct CoverageScorer {
    weighting: Arc<dyn TargetWeighting>,
}

impl Default for CoverageScorer {
    fn default() -> Self {
        Self::new(Arc::new(UniformWeighting))
    }
}

impl std::fmt::Debug for CoverageScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageScorer").finish_non_exhaustive()
    }
}

impl CoverageScorer {
    pub fn new(weighting: Arc<dyn TargetWeighting>) -> Self {
        Self { weighting }
    }

    pub fn score(&self, rule: &Rule, outcome: &RuleOutcome, doc: &Document) -> RuleScore {
        let findings = outcome.findings(rule);
        let mut result = RuleScore {
            rule_id: rule.id.to_string(),
            name: rule.name.to_string(),
            category: rule.category,
            max_score: rule.points,
            coverage: 1.0,
            score: rule.points,
            targets_checked: outcome.targets.len(),
            targets_passed: outcome.targets.iter().filter(|t| t.result.passed).count(),
            applicable: !outcome.targets.is_empty(),
            faulted: outcome.is_faulted(),
            findings,
            adjustments: Vec::new(),
        };

        if result.faulted {
            result.applicable = true;
            result.coverage = 0.0;
            result.score = 0.0;
            return result;
        }
        if !result.applicable {
            return result;
        }

        let mut total = 0.0;
        let mut passed = 0.0;
        for outcome in &outcome.targets {
            let weight = self.target_weight(rule, &outcome.target, doc);
            total += weight;
            if outcome.result.passed {
                passed += weight;
            }
        }
        let coverage = if total > 0.0 {
            passed / total
        } else {
            result.targets_passed as f64 / result.targets_checked as f64
        };

        result.coverage = coverage.clamp(0.0, 1.0);
        result.score = result.coverage * rule.points;
        result
    }

    fn target_weight(&self, rule: &Rule, target: &Target, doc: &Document) -> f64 {
        let weight = self.weighting.weight(rule, target, doc);
        if weight.is_finite() && weight >= 0.0 {
            weight
        } else {
            warn!(
                "Invalid weight {} for {} target {}; using 1.0",
                weight, rule.id, target.label
            );
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use crate::rules::{Effort, RuleEvaluator, ValidationResult};
    use serde_json::json;

    fn operations(doc: &Document) -> Vec<Target> {
        doc.operations().iter().map(Target::operation).collect()
    }

    fn nothing(_doc: &Document) -> Vec<Target> {
        Vec::new()
    }

    fn has_summary(target: &Target, doc: &Document) -> ValidationResult {
        let passed = target
            .resolve_operation(doc)
            .is_some_and(|op| op.str_field("summary").is_some());
        ValidationResult::check(passed, "ok", "missing summary")
    }

    fn rule(detect: crate::rules::DetectFn) -> Rule {
        Rule {
            id: "MAINT-T",
            name: "summary",
            description: "",
            category: Category::Maintainability,
            severity: Severity::Low,
            points: 4.0,
            effort: Effort::Trivial,
            remediation: "",
            detect,
            validate: has_summary,
        }
    }

    fn four_operations() -> Document {
        Document::new(json!({"paths": {
            "/a": {"get": {"summary": "a"}, "post": {"summary": "b"}},
            "/b": {"get": {"summary": "c"}, "delete": {}}
        }}))
    }

    #[test]
    fn test_three_of_four_targets_scores_three_points() {
        let doc = four_operations();
        let r = rule(operations);
        let outcome = RuleEvaluator::sequential().evaluate(&r, &doc);
        let score = CoverageScorer::default().score(&r, &outcome, &doc);
        assert_eq!(score.targets_checked, 4);
        assert_eq!(score.targets_passed, 3);
        assert_eq!(score.coverage, 0.75);
        assert_eq!(score.score, 3.0);
        assert_eq!(score.findings.len(), 1);
    }

    #[test]
    fn test_zero_targets_earns_full_credit() {
        let doc = four_operations();
        let r = rule(nothing);
        let outcome = RuleEvaluator::sequential().evaluate(&r, &doc);
        let score = CoverageScorer::default().score(&r, &outcome, &doc);
        assert!(!score.applicable);
        assert_eq!(score.coverage, 1.0);
        assert_eq!(score.score, 4.0);
        assert!(score.findings.is_empty());
    }

    struct DeleteHeavy;

    impl TargetWeighting for DeleteHeavy {
        fn weight(&self, _rule: &Rule, target: &Target, _doc: &Document) -> f64 {
            if target.label.starts_with("DELETE") {
                3.0
            } else {
                f64::NAN
            }
        }
    }

    #[test]
    fn test_weighting_hook() {
        let doc = four_operations();
        let r = rule(operations);
        let outcome = RuleEvaluator::sequential().evaluate(&r, &doc);
        // DELETE weighs 3, the invalid weights fall back to 1
        let score = CoverageScorer::new(Arc::new(DeleteHeavy)).score(&r, &outcome, &doc);
        assert_eq!(score.coverage, 0.5);
        assert_eq!(score.score, 2.0);
    }

    struct Zero;

    impl TargetWeighting for Zero {
        fn weight(&self, _rule: &Rule, _target: &Target, _doc: &Document) -> f64 {
            0.0
        }
    }

    #[test]
    fn test_all_zero_weights_fall_back_to_counts() {
        let doc = four_operations();
        let r = rule(operations);
        let outcome = RuleEvaluator::sequential().evaluate(&r, &doc);
        let score = CoverageScorer::new(Arc::new(Zero)).score(&r, &outcome, &doc);
        assert_eq!(score.coverage, 0.75);
    }
}
