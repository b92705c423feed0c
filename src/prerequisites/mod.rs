//! Prerequisite gate
//!
//! Runs a set of prerequisite rules before scoring. If any of them produces a
//! finding the document is not graded at all. Two flavours:
//!
//! - the fixed gate: structural checks, API id, PREREQ-001/002/003
//! - the profile-aware gate: the profile decides which prerequisites apply
//!   and may add its own; the rest are reported as skipped

use crate::document::Document;
use crate::models::{sort_findings, Finding};
use crate::profiles::GradingProfile;
use crate::rules::{RuleEvaluator, RuleRegistry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Structural checks every profile enforces
pub const STRUCTURAL_PREREQUISITES: [&str; 4] = [
    "PREREQ-OPENAPI",
    "PREREQ-INFO-TITLE",
    "PREREQ-INFO-VERSION",
    "PREREQ-PATHS",
];

/// Tracking identifier checks
pub const API_ID_PREREQUISITES: [&str; 2] = ["PREREQ-API-ID", "PREREQ-API-ID-FORMAT"];

/// Authentication, HTTPS, tenant header
pub const FIXED_PREREQUISITES: [&str; 3] = ["PREREQ-001", "PREREQ-002", "PREREQ-003"];

/// Outcome of the gate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrerequisiteResult {
    pub passed: bool,
    /// Findings of failing prerequisites, in report order
    pub failures: Vec<Finding>,
    /// Distinct remediation hints, one per failing prerequisite
    pub required_fixes: Vec<String>,
    /// Prerequisite ids that were evaluated
    pub checked: Vec<String>,
    /// Fixed prerequisites the active profile does not enforce
    pub skipped_prerequisites: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl PrerequisiteResult {
    /// Ids of the prerequisites that failed, in evaluation order
    pub fn failed_ids(&self) -> Vec<&str> {
        self.checked
            .iter()
            .filter(|id| self.failures.iter().any(|f| &f.rule_id == *id))
            .map(String::as_str)
            .collect()
    }
}

/// Evaluates prerequisite rules from a registry
pub struct PrerequisiteGate<'a> {
    registry: &'a RuleRegistry,
    evaluator: RuleEvaluator,
}

impl<'a> PrerequisiteGate<'a> {
    pub fn new(registry: &'a RuleRegistry) -> Self {
        Self {
            registry,
            evaluator: RuleEvaluator::default(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: RuleEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Fixed gate: structural, API id, authentication, HTTPS, tenant header
    pub fn check(&self, doc: &Document) -> PrerequisiteResult {
        let ids: Vec<String> = STRUCTURAL_PREREQUISITES
            .iter()
            .chain(API_ID_PREREQUISITES.iter())
            .chain(FIXED_PREREQUISITES.iter())
            .map(|id| id.to_string())
            .collect();
        self.run(doc, ids, Vec::new(), None)
    }

    /// Profile-aware gate
    pub fn check_with_profile(&self, doc: &Document, profile: &GradingProfile) -> PrerequisiteResult {
        let (applicable, skipped) = applicable_prerequisites(profile);
        self.run(doc, applicable, skipped, Some(profile.name.clone()))
    }

    fn run(
        &self,
        doc: &Document,
        ids: Vec<String>,
        mut skipped: Vec<String>,
        profile: Option<String>,
    ) -> PrerequisiteResult {
        let mut rules = Vec::with_capacity(ids.len());
        let mut checked = Vec::with_capacity(ids.len());
        for id in ids {
            match self.registry.get(&id) {
                Some(rule) => {
                    rules.push(rule);
                    checked.push(id);
                }
                None => {
                    warn!("Prerequisite {} is not in the active rule set; skipping", id);
                    skipped.push(id);
                }
            }
        }

        let outcomes = self.evaluator.evaluate_all(&rules, doc);
        let mut failures: Vec<Finding> = rules
            .iter()
            .zip(&outcomes)
            .flat_map(|(rule, outcome)| outcome.findings(rule))
            .collect();
        sort_findings(&mut failures);

        let mut required_fixes: Vec<String> = Vec::new();
        for finding in &failures {
            if let Some(hint) = &finding.fix_hint {
                if !required_fixes.contains(hint) {
                    required_fixes.push(hint.clone());
                }
            }
        }

        let passed = failures.is_empty();
        let mut result = PrerequisiteResult {
            passed,
            failures,
            required_fixes,
            checked,
            skipped_prerequisites: skipped,
            blocked_reason: None,
            profile,
        };
        if !passed {
            let failed = result.failed_ids();
            let reason = format!(
                "Prerequisite gate failed: {} of {} prerequisites failed ({})",
                failed.len(),
                result.checked.len(),
                failed.join(", ")
            );
            info!("{}", reason);
            result.blocked_reason = Some(reason);
        } else {
            debug!("Prerequisite gate passed ({} checks)", result.checked.len());
        }
        result
    }
}

/// Prerequisites a profile enforces, and the fixed ones it skips
pub fn applicable_prerequisites(profile: &GradingProfile) -> (Vec<String>, Vec<String>) {
    let mut applicable: Vec<String> = STRUCTURAL_PREREQUISITES
        .iter()
        .map(|id| id.to_string())
        .collect();
    let mut skipped = Vec::new();

    let mut decide = |ids: &[&str], enforce: bool| {
        for id in ids {
            if enforce {
                applicable.push(id.to_string());
            } else {
                skipped.push(id.to_string());
            }
        }
    };
    decide(&API_ID_PREREQUISITES, profile.requires_api_id);
    decide(&["PREREQ-001"], profile.requires_authentication);
    decide(&["PREREQ-002"], true);
    decide(&["PREREQ-003"], profile.requires_multi_tenant_headers);

    for id in &profile.custom_prerequisites {
        if !applicable.contains(id) {
            applicable.push(id.clone());
        }
        skipped.retain(|s| s != id);
    }
    (applicable, skipped)
}

/// Fixed gate over the built-in rules
pub fn check_prerequisites(doc: &Document) -> PrerequisiteResult {
    PrerequisiteGate::new(&RuleRegistry::builtin()).check(doc)
}

/// Profile-aware gate over the built-in rules
pub fn check_prerequisites_for_profile(doc: &Document, profile: &GradingProfile) -> PrerequisiteResult {
    PrerequisiteGate::new(&RuleRegistry::builtin()).check_with_profile(doc, profile)
}
