//! Rule evaluation with fault isolation
//!
//! The RuleEvaluator runs `detect` then `validate` for each target:
//! - A panic in `detect` faults the whole rule (no credit, one critical finding)
//! - A panic in `validate` fails only that target (critical finding)
//! - Other rules are never affected by a faulting rule
//!
//! Rules are independent, so a batch may be evaluated in parallel with rayon.
//! Output order always matches input order.

use crate::document::Document;
use crate::models::{Finding, Severity};
use crate::rules::base::{Rule, Target, ValidationResult};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, error};

/// Result of validating one target
#[derive(Debug, Clone, PartialEq)]
pub struct TargetOutcome {
    pub target: Target,
    pub result: ValidationResult,
    /// `validate` panicked for this target
    pub faulted: bool,
}

/// Result of evaluating one rule against one document
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub targets: Vec<TargetOutcome>,
    /// Set when `detect` panicked; `targets` is then empty
    pub fault: Option<String>,
    pub duration_ms: u64,
}

impl RuleOutcome {
    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    /// True when detection succeeded and every target passed
    pub fn passed(&self) -> bool {
        self.fault.is_none() && self.targets.iter().all(|t| t.result.passed)
    }

    pub fn failed_targets(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.targets.iter().filter(|t| !t.result.passed)
    }

    /// One finding per failing target, or a single critical finding for a faulted rule
    pub fn findings(&self, rule: &Rule) -> Vec<Finding> {
        if let Some(fault) = &self.fault {
            return vec![Finding::new(
                rule.id,
                Severity::Critical,
                rule.category,
                "#",
                format!("Rule {} faulted during detection: {}", rule.id, fault),
            )];
        }

        self.failed_targets()
            .map(|outcome| {
                let severity = if outcome.faulted {
                    Severity::Critical
                } else {
                    rule.severity
                };
                let hint = outcome
                    .result
                    .fix_hint
                    .clone()
                    .or_else(|| (!rule.remediation.is_empty()).then(|| rule.remediation.to_string()));
                Finding::new(
                    rule.id,
                    severity,
                    rule.category,
                    outcome.target.location.clone(),
                    outcome.result.message.clone(),
                )
                .with_fix_hint(hint)
            })
            .collect()
    }
}

/// Runs rules against a document
#[derive(Debug, Clone, Copy)]
pub struct RuleEvaluator {
    parallel: bool,
}

impl Default for RuleEvaluator {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl RuleEvaluator {
    pub fn new(parallel: bool) -> Self {
        Self { parallel }
    }

    pub fn sequential() -> Self {
        Self { parallel: false }
    }

    /// Evaluate a single rule
    pub fn evaluate(&self, rule: &Rule, doc: &Document) -> RuleOutcome {
        let start = Instant::now();
        debug!("Evaluating rule: {}", rule.id);

        let detected = catch_unwind(AssertUnwindSafe(|| (rule.detect)(doc)));
        let targets = match detected {
            Ok(targets) => targets,
            Err(panic_info) => {
                let msg = panic_message(panic_info);
                error!("Rule {} panicked during detection: {}", rule.id, msg);
                return RuleOutcome {
                    rule_id: rule.id.to_string(),
                    targets: Vec::new(),
                    fault: Some(msg),
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
        };

        let targets: Vec<TargetOutcome> = targets
            .into_iter()
            .map(|target| validate_target(rule, target, doc))
            .collect();

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            "Rule {} checked {} targets in {}ms",
            rule.id,
            targets.len(),
            duration_ms
        );

        RuleOutcome {
            rule_id: rule.id.to_string(),
            targets,
            fault: None,
            duration_ms,
        }
    }

    /// Evaluate a batch of rules; output order matches `rules`
    pub fn evaluate_all(&self, rules: &[&Rule], doc: &Document) -> Vec<RuleOutcome> {
        if self.parallel {
            rules
                .par_iter()
                .map(|rule| self.evaluate(rule, doc))
                .collect()
        } else {
            rules.iter().map(|rule| self.evaluate(rule, doc)).collect()
        }
    }
}

fn validate_target(rule: &Rule, target: Target, doc: &Document) -> TargetOutcome {
    match catch_unwind(AssertUnwindSafe(|| (rule.validate)(&target, doc))) {
        Ok(result) => TargetOutcome {
            target,
            result,
            faulted: false,
        },
        Err(panic_info) => {
            let msg = panic_message(panic_info);
            error!(
                "Rule {} panicked validating {}: {}",
                rule.id, target.label, msg
            );
            TargetOutcome {
                result: ValidationResult::fail(format!(
                    "Rule {} faulted while validating {}: {}",
                    rule.id, target.label, msg
                )),
                target,
                faulted: true,
            }
        }
    }
}

pub(crate) fn panic_message(panic_info: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::rules::base::Effort;
    use serde_json::json;

    fn ops(doc: &Document) -> Vec<Target> {
        doc.operations().iter().map(Target::operation).collect()
    }

    fn has_summary(target: &Target, doc: &Document) -> ValidationResult {
        let Some(op) = target.resolve_operation(doc) else {
            return ValidationResult::unresolved(target);
        };
        ValidationResult::check(
            op.str_field("summary").is_some(),
            "has summary",
            format!("{} has no summary", target.label),
        )
    }

    fn exploding_detect(_doc: &Document) -> Vec<Target> {
        panic!("detector blew up")
    }

    fn exploding_on_delete(target: &Target, doc: &Document) -> ValidationResult {
        if target.label.starts_with("DELETE") {
            panic!("cannot validate {}", target.label);
        }
        has_summary(target, doc)
    }

    fn rule(id: &'static str, detect: crate::rules::DetectFn, validate: crate::rules::ValidateFn) -> Rule {
        Rule {
            id,
            name: "test rule",
            description: "",
            category: Category::Maintainability,
            severity: Severity::Low,
            points: 4.0,
            effort: Effort::Trivial,
            remediation: "Add a summary",
            detect,
            validate,
        }
    }

    fn doc() -> Document {
        Document::new(json!({
            "paths": {
                "/a": {
                    "get": {"summary": "A"},
                    "delete": {"summary": "Delete A"}
                },
                "/b": {"get": {}}
            }
        }))
    }

    #[test]
    fn test_evaluate_collects_target_results() {
        let r = rule("T-1", ops, has_summary);
        let outcome = RuleEvaluator::sequential().evaluate(&r, &doc());
        assert_eq!(outcome.targets.len(), 3);
        assert!(!outcome.passed());
        let findings = outcome.findings(&r);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].location, "#/paths/~1b/get");
        assert_eq!(findings[0].severity, Severity::Low);
        assert_eq!(findings[0].fix_hint.as_deref(), Some("Add a summary"));
    }

    #[test]
    fn test_detect_panic_faults_rule_only() {
        let bad = rule("T-BAD", exploding_detect, has_summary);
        let good = rule("T-GOOD", ops, has_summary);
        let outcomes = RuleEvaluator::new(true).evaluate_all(&[&bad, &good], &doc());
        assert_eq!(outcomes[0].rule_id, "T-BAD");
        assert!(outcomes[0].is_faulted());
        assert!(outcomes[0].fault.as_deref().unwrap_or("").contains("blew up"));
        let findings = outcomes[0].findings(&bad);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);

        assert_eq!(outcomes[1].rule_id, "T-GOOD");
        assert!(!outcomes[1].is_faulted());
        assert_eq!(outcomes[1].targets.len(), 3);
    }

    #[test]
    fn test_validate_panic_fails_only_that_target() {
        let r = rule("T-2", ops, exploding_on_delete);
        let outcome = RuleEvaluator::sequential().evaluate(&r, &doc());
        assert!(!outcome.is_faulted());
        let faulted: Vec<&TargetOutcome> = outcome.targets.iter().filter(|t| t.faulted).collect();
        assert_eq!(faulted.len(), 1);
        assert_eq!(faulted[0].target.label, "DELETE /a");

        let findings = outcome.findings(&r);
        // DELETE /a faulted (critical) and GET /b lacks a summary (rule severity)
        assert_eq!(findings.len(), 2);
        assert!(findings
            .iter()
            .any(|f| f.severity == Severity::Critical && f.location == "#/paths/~1a/delete"));
    }
}
