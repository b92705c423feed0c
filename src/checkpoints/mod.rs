//! Checkpoint engine
//!
//! A standalone grader for one fixed target template: a flat list of
//! weighted pass/fail checkpoints over the whole document. It shares the
//! document model with the rule engine but nothing else.
//!
//! ```text
//! raw score = Σ weight of passing checkpoints       (built-in weights sum to 100)
//! score     = min(raw score, 59)  if any auto-fail checkpoint failed
//! ```
//!
//! Auto-fail checkpoints mark blocking defects. The clamp keeps the partial
//! credit visible instead of zeroing the score.

mod http;
mod responses;
mod security;
mod structure;

use crate::config::ConfigError;
use crate::document::{Document, Operation};
use crate::rules::engine::panic_message;
use crate::scoring::LetterGrade;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info};

/// Highest score a document with a failing auto-fail checkpoint can get
pub const AUTO_FAIL_CEILING: u32 = 59;

/// Score needed to pass
pub const CHECKPOINT_PASSING_SCORE: u8 = 70;

/// Examples listed in a failure message
const MAX_EXAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointCategory {
    Structure,
    Servers,
    Tags,
    Security,
    MultiTenancy,
    HttpSemantics,
    RateLimiting,
    Caching,
    ResponseEnvelope,
    Pagination,
    AsyncOperations,
    ContentNegotiation,
    Webhooks,
    Documentation,
    Extensions,
}

impl CheckpointCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointCategory::Structure => "structure",
            CheckpointCategory::Servers => "servers",
            CheckpointCategory::Tags => "tags",
            CheckpointCategory::Security => "security",
            CheckpointCategory::MultiTenancy => "multi-tenancy",
            CheckpointCategory::HttpSemantics => "http semantics",
            CheckpointCategory::RateLimiting => "rate limiting",
            CheckpointCategory::Caching => "caching",
            CheckpointCategory::ResponseEnvelope => "response envelope",
            CheckpointCategory::Pagination => "pagination",
            CheckpointCategory::AsyncOperations => "async operations",
            CheckpointCategory::ContentNegotiation => "content negotiation",
            CheckpointCategory::Webhooks => "webhooks",
            CheckpointCategory::Documentation => "documentation",
            CheckpointCategory::Extensions => "extensions",
        }
    }
}

impl std::fmt::Display for CheckpointCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub passed: bool,
    pub message: String,
}

impl CheckOutcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }

    pub fn check(condition: bool, ok: impl Into<String>, failed: impl Into<String>) -> Self {
        if condition {
            Self::pass(ok)
        } else {
            Self::fail(failed)
        }
    }
}

/// A named, weighted pass/fail test over the whole document
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub id: &'static str,
    pub category: CheckpointCategory,
    pub description: &'static str,
    pub weight: u32,
    /// Failing this checkpoint clamps the score to [`AUTO_FAIL_CEILING`]
    pub auto_fail: bool,
    pub check: fn(&Document) -> CheckOutcome,
}

impl Checkpoint {
    pub fn new(
        id: &'static str,
        category: CheckpointCategory,
        weight: u32,
        description: &'static str,
        check: fn(&Document) -> CheckOutcome,
    ) -> Self {
        Self {
            id,
            category,
            description,
            weight,
            auto_fail: false,
            check,
        }
    }

    /// Mark as a blocking defect
    pub fn auto_fail(mut self) -> Self {
        self.auto_fail = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointResult {
    pub id: String,
    pub category: CheckpointCategory,
    pub description: String,
    pub weight: u32,
    pub auto_fail: bool,
    pub passed: bool,
    pub message: String,
    /// The check panicked
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub faulted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointReport {
    /// Final score after the auto-fail clamp
    pub score: u8,
    /// Σ weight of passing checkpoints
    pub raw_score: u32,
    /// Σ weight of all checkpoints
    pub max_score: u32,
    pub clamped: bool,
    /// Ids of failing auto-fail checkpoints
    pub auto_failures: Vec<String>,
    pub results: Vec<CheckpointResult>,
    pub letter_grade: LetterGrade,
    pub passed: bool,
}

impl CheckpointReport {
    pub fn failures(&self) -> impl Iterator<Item = &CheckpointResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn result(&self, id: &str) -> Option<&CheckpointResult> {
        self.results.iter().find(|r| r.id == id)
    }
}

pub struct CheckpointEngine {
    checkpoints: Vec<Checkpoint>,
}

impl Default for CheckpointEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CheckpointEngine {
    pub fn new(checkpoints: Vec<Checkpoint>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for checkpoint in &checkpoints {
            if !seen.insert(checkpoint.id) {
                return Err(ConfigError::DuplicateCheckpoint(checkpoint.id.to_string()));
            }
        }
        Ok(Self { checkpoints })
    }

    pub fn builtin() -> Self {
        Self {
            checkpoints: builtin_checkpoints(),
        }
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn total_weight(&self) -> u32 {
        self.checkpoints.iter().map(|c| c.weight).sum()
    }

    pub fn run(&self, doc: &Document) -> CheckpointReport {
        let results: Vec<CheckpointResult> =
            self.checkpoints.iter().map(|c| run_checkpoint(c, doc)).collect();

        let raw_score: u32 = results.iter().filter(|r| r.passed).map(|r| r.weight).sum();
        let auto_failures: Vec<String> = results
            .iter()
            .filter(|r| r.auto_fail && !r.passed)
            .map(|r| r.id.clone())
            .collect();

        let clamped = !auto_failures.is_empty() && raw_score > AUTO_FAIL_CEILING;
        let capped = if auto_failures.is_empty() {
            raw_score
        } else {
            raw_score.min(AUTO_FAIL_CEILING)
        };
        let score = capped.min(100) as u8;
        let letter_grade = LetterGrade::from_score(score);

        if !auto_failures.is_empty() {
            info!(
                "Auto-fail checkpoints failed ({}); score {} -> {}",
                auto_failures.join(", "),
                raw_score,
                score
            );
        }
        debug!(
            "Checkpoints: {} of {} passed, score {}",
            results.iter().filter(|r| r.passed).count(),
            results.len(),
            score
        );

        CheckpointReport {
            score,
            raw_score,
            max_score: self.total_weight(),
            clamped,
            auto_failures,
            results,
            letter_grade,
            passed: score >= CHECKPOINT_PASSING_SCORE,
        }
    }
}

fn run_checkpoint(checkpoint: &Checkpoint, doc: &Document) -> CheckpointResult {
    let (outcome, faulted) = match catch_unwind(AssertUnwindSafe(|| (checkpoint.check)(doc))) {
        Ok(outcome) => (outcome, false),
        Err(panic_info) => {
            let msg = panic_message(panic_info);
            error!("Checkpoint {} panicked: {}", checkpoint.id, msg);
            (
                CheckOutcome::fail(format!("Checkpoint {} faulted: {}", checkpoint.id, msg)),
                true,
            )
        }
    };
    CheckpointResult {
        id: checkpoint.id.to_string(),
        category: checkpoint.category,
        description: checkpoint.description.to_string(),
        weight: checkpoint.weight,
        auto_fail: checkpoint.auto_fail,
        passed: outcome.passed,
        message: outcome.message,
        faulted,
    }
}

/// All built-in checkpoints, in report order
pub fn builtin_checkpoints() -> Vec<Checkpoint> {
    let mut checkpoints = structure::checkpoints();
    checkpoints.extend(security::checkpoints());
    checkpoints.extend(http::checkpoints());
    checkpoints.extend(responses::checkpoints());
    checkpoints
}

/// Run the built-in checkpoints
pub fn run_checkpoints(doc: &Document) -> CheckpointReport {
    CheckpointEngine::builtin().run(doc)
}

/// `a, b, c and 2 more`
fn sample(items: &[String]) -> String {
    let shown: Vec<&str> = items.iter().take(MAX_EXAMPLES).map(String::as_str).collect();
    let mut text = shown.join(", ");
    if items.len() > MAX_EXAMPLES {
        text.push_str(&format!(" and {} more", items.len() - MAX_EXAMPLES));
    }
    text
}

/// Pass when `check` holds for every operation `applies` selects.
/// No applicable operation counts as a pass.
fn every_operation<'a>(
    doc: &'a Document,
    applies: impl Fn(&Operation<'a>) -> bool,
    check: impl Fn(&Operation<'a>) -> bool,
    what: &str,
) -> CheckOutcome {
    let ops = doc.operations();
    let applicable: Vec<&Operation<'a>> = ops.iter().filter(|&op| applies(op)).collect();
    if applicable.is_empty() {
        return CheckOutcome::pass(format!("no operations need {what}"));
    }
    let failing: Vec<String> = applicable
        .iter()
        .filter(|op| !check(op))
        .map(|op| op.label())
        .collect();
    if failing.is_empty() {
        CheckOutcome::pass(format!("{} operations have {what}", applicable.len()))
    } else {
        CheckOutcome::fail(format!(
            "{} of {} operations lack {what}: {}",
            failing.len(),
            applicable.len(),
            sample(&failing)
        ))
    }
}

/// Non-blank string field of a node
fn text_field<'a>(node: &'a Value, key: &str) -> Option<&'a str> {
    node.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Pass when nothing failed, else list the offenders after `problem`
fn none_failing(failing: Vec<String>, ok: &str, problem: &str) -> CheckOutcome {
    if failing.is_empty() {
        CheckOutcome::pass(ok)
    } else {
        CheckOutcome::fail(format!("{problem}: {}", sample(&failing)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn passing(_doc: &Document) -> CheckOutcome {
        CheckOutcome::pass("ok")
    }

    fn failing(_doc: &Document) -> CheckOutcome {
        CheckOutcome::fail("no")
    }

    fn exploding(_doc: &Document) -> CheckOutcome {
        panic!("checkpoint blew up")
    }

    const IDS: [&str; 20] = [
        "T-01", "T-02", "T-03", "T-04", "T-05", "T-06", "T-07", "T-08", "T-09", "T-10", "T-11",
        "T-12", "T-13", "T-14", "T-15", "T-16", "T-17", "T-18", "T-19", "T-20",
    ];

    fn synthetic(failing_id: &'static str, check: fn(&Document) -> CheckOutcome) -> CheckpointEngine {
        let checkpoints = IDS
            .iter()
            .map(|&id| Checkpoint {
                id,
                category: CheckpointCategory::Structure,
                description: "synthetic",
                weight: 5,
                auto_fail: id == failing_id,
                check: if id == failing_id { check } else { passing },
            })
            .collect();
        CheckpointEngine::new(checkpoints).expect("unique ids")
    }

    #[test]
    fn test_builtin_weights_sum_to_one_hundred() {
        let engine = CheckpointEngine::builtin();
        assert_eq!(engine.total_weight(), 100);
        assert_eq!(engine.checkpoints().len(), 73);
        let ids: HashSet<&str> = engine.checkpoints().iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), 73);
    }

    #[test]
    fn test_auto_fail_clamps_score() {
        // 19 of 20 checkpoints pass: 95 points
        let report = synthetic("T-07", failing).run(&Document::new(json!({})));
        assert_eq!(report.raw_score, 95);
        assert_eq!(report.score, 59);
        assert!(report.clamped);
        assert_eq!(report.auto_failures, vec!["T-07"]);
        assert_eq!(report.letter_grade, LetterGrade::F);
        assert!(!report.passed);
    }

    #[test]
    fn test_no_auto_failure_keeps_raw_score() {
        let report = synthetic("T-07", passing).run(&Document::new(json!({})));
        assert_eq!(report.score, 100);
        assert!(!report.clamped);
        assert!(report.passed);
    }

    #[test]
    fn test_panicking_checkpoint_fails_alone() {
        let report = synthetic("T-03", exploding).run(&Document::new(json!({})));
        let faulted = report.result("T-03").expect("result");
        assert!(faulted.faulted);
        assert!(!faulted.passed);
        assert!(faulted.message.contains("blew up"));
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let checkpoint = Checkpoint {
            id: "DUP",
            category: CheckpointCategory::Tags,
            description: "",
            weight: 1,
            auto_fail: false,
            check: passing,
        };
        let err = CheckpointEngine::new(vec![checkpoint.clone(), checkpoint]).err();
        assert!(matches!(err, Some(ConfigError::DuplicateCheckpoint(_))));
    }

    #[test]
    fn test_empty_document_does_not_panic() {
        let report = run_checkpoints(&Document::new(json!({})));
        assert!(report.results.iter().all(|r| !r.faulted));
        assert!(!report.auto_failures.is_empty());
        assert!(report.score <= 59);
    }

    #[test]
    fn test_sample_truncates() {
        let items: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        assert_eq!(sample(&items), "a, b, c and 2 more");
        assert_eq!(sample(&items[..2]), "a, b");
    }
}
