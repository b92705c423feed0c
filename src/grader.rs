//! Grading orchestration
//!
//! ```text
//! profile → prerequisite gate ──blocked──▶ GradeResult (score 0, F)
//!                │ passed
//!                ▼
//!        evaluate scored rules → coverage scores → adjust → grade
//! ```
//!
//! A grading run never fails: rule faults become findings and progress
//! callback errors are logged and dropped. Only building a [`Grader`] can
//! fail, with a [`ConfigError`].

use crate::classifier::{Classification, PatternClassifier};
use crate::config::{ConfigError, GraderConfig};
use crate::document::Document;
use crate::models::Finding;
use crate::prerequisites::{PrerequisiteGate, PrerequisiteResult};
use crate::profiles::{GradingProfile, ProfileCatalog, DEFAULT_PROFILE};
use crate::rules::engine::panic_message;
use crate::rules::{RuleEvaluator, RuleRegistry};
use crate::scoring::{
    builtin_interactions, CategoryWeights, CoverageScorer, GradeCalculator, GradeResult,
    RuleScore, ScoreAdjuster, TargetWeighting, DEFAULT_PASSING_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Stage labels passed to the progress callback
pub const STAGE_PREREQUISITES: &str = "prerequisites";
pub const STAGE_SCORING: &str = "scoring";
pub const STAGE_GRADE: &str = "grade";

/// Progress callback: `(stage, percent, note)`.
/// Errors and panics are logged at debug level and otherwise ignored.
pub type ProgressCallback =
    Box<dyn Fn(&str, u8, Option<&str>) -> anyhow::Result<()> + Send + Sync>;

/// How the grading profile is chosen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProfileSelection {
    /// Fixed prerequisite gate, every rule enabled
    #[default]
    Fixed,
    /// A profile from the catalogue
    Named(String),
    /// The classifier's suggestion
    Auto,
}

impl ProfileSelection {
    /// `None` → fixed gate, `"auto"` → classifier, anything else → named profile
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            None => ProfileSelection::Fixed,
            Some(n) if n.eq_ignore_ascii_case("auto") => ProfileSelection::Auto,
            Some(n) => ProfileSelection::Named(n.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraderOptions {
    /// Fan rule evaluation out over rayon's pool
    pub parallel: bool,
}

impl Default for GraderOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Result of grading two versions of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeComparison {
    pub before: GradeResult,
    pub after: GradeResult,
    pub score_delta: i16,
    /// Findings present only in the new version
    pub new_findings: Vec<Finding>,
    /// Findings present only in the old version
    pub fixed_findings: Vec<Finding>,
}

impl GradeComparison {
    pub fn improved(&self) -> bool {
        self.score_delta > 0
    }

    pub fn regressed(&self) -> bool {
        self.score_delta < 0
    }
}

/// Findings in `current` whose fingerprint does not occur in `baseline`
fn unmatched(current: &[Finding], baseline: &[Finding]) -> Vec<Finding> {
    let known: HashSet<String> = baseline.iter().map(Finding::fingerprint).collect();
    current
        .iter()
        .filter(|f| !known.contains(&f.fingerprint()))
        .cloned()
        .collect()
}

/// Grades documents against a rule registry, a profile and scoring settings
pub struct Grader {
    registry: Arc<RuleRegistry>,
    profiles: ProfileCatalog,
    selection: ProfileSelection,
    calculator: GradeCalculator,
    adjuster: ScoreAdjuster,
    scorer: CoverageScorer,
    classifier: PatternClassifier,
    evaluator: RuleEvaluator,
    progress: Option<ProgressCallback>,
}

impl Default for Grader {
    fn default() -> Self {
        Self {
            registry: RuleRegistry::builtin(),
            profiles: ProfileCatalog::builtin(),
            selection: ProfileSelection::Fixed,
            calculator: GradeCalculator::default(),
            adjuster: ScoreAdjuster::builtin(),
            scorer: CoverageScorer::default(),
            classifier: PatternClassifier::new(),
            evaluator: RuleEvaluator::default(),
            progress: None,
        }
    }
}

impl Grader {
    pub fn builder() -> GraderBuilder {
        GraderBuilder::new()
    }

    /// Build a grader from a loaded configuration
    pub fn from_config(config: &GraderConfig) -> Result<Self, ConfigError> {
        GraderBuilder::from_config(config)?.build()
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn profiles(&self) -> &ProfileCatalog {
        &self.profiles
    }

    pub fn selection(&self) -> &ProfileSelection {
        &self.selection
    }

    pub fn calculator(&self) -> &GradeCalculator {
        &self.calculator
    }

    /// Set a progress callback
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn classify(&self, doc: &Document) -> Classification {
        self.classifier.classify(doc)
    }

    /// Profile in force for this document, `None` under the fixed gate
    pub fn active_profile(&self, doc: &Document) -> Option<&GradingProfile> {
        match &self.selection {
            ProfileSelection::Fixed => None,
            ProfileSelection::Named(name) => self.profiles.get(name),
            ProfileSelection::Auto => {
                let suggestion = self.classifier.classify(doc).suggested_profile;
                debug!("Classifier suggested profile '{}'", suggestion);
                self.profiles
                    .get(&suggestion)
                    .or_else(|| self.profiles.get(DEFAULT_PROFILE))
            }
        }
    }

    /// Run the prerequisite gate only
    pub fn check_prerequisites(&self, doc: &Document) -> PrerequisiteResult {
        let profile = self.active_profile(doc);
        self.gate(doc, profile)
    }

    fn gate(&self, doc: &Document, profile: Option<&GradingProfile>) -> PrerequisiteResult {
        let gate = PrerequisiteGate::new(&self.registry).with_evaluator(self.evaluator);
        match profile {
            Some(profile) => gate.check_with_profile(doc, profile),
            None => gate.check(doc),
        }
    }

    /// Grade one document
    pub fn grade(&self, doc: &Document) -> GradeResult {
        let start = Instant::now();
        let profile = self.active_profile(doc);
        let profile_name = profile.map(|p| p.name.clone());
        info!(
            "Grading with profile {}",
            profile_name.as_deref().unwrap_or("(fixed gate)")
        );

        let prerequisites = self.gate(doc, profile);
        self.report_progress(
            STAGE_PREREQUISITES,
            33,
            prerequisites.blocked_reason.as_deref(),
        );
        if !prerequisites.passed {
            let result = self.calculator.blocked(prerequisites, profile_name);
            self.report_progress(STAGE_GRADE, 100, Some("blocked"));
            return result;
        }

        let scores = self.score_rules(doc, profile);
        self.report_progress(
            STAGE_SCORING,
            66,
            Some(&format!("{} rules scored", scores.len())),
        );

        let adjusted = self.adjuster.adjust(&scores);
        let result = self
            .calculator
            .calculate(adjusted, prerequisites, profile_name);
        self.report_progress(
            STAGE_GRADE,
            100,
            Some(&format!("{} ({})", result.score, result.letter_grade)),
        );
        debug!("Graded in {:?}", start.elapsed());
        result
    }

    /// Evaluate and score every scored rule the profile leaves enabled
    fn score_rules(&self, doc: &Document, profile: Option<&GradingProfile>) -> Vec<RuleScore> {
        let filtered;
        let registry: &RuleRegistry = match profile {
            Some(p) if !p.disabled_rules.is_empty() => {
                debug!("Profile {} disables {:?}", p.name, p.disabled_rules);
                filtered = self.registry.without(&p.disabled_rules);
                &filtered
            }
            _ => &self.registry,
        };

        let rules = registry.scored_rules();
        let outcomes = self.evaluator.evaluate_all(&rules, doc);
        rules
            .iter()
            .zip(&outcomes)
            .map(|(rule, outcome)| self.scorer.score(rule, outcome, doc))
            .collect()
    }

    /// Grade two versions independently and diff their findings
    pub fn compare(&self, old: &Document, new: &Document) -> GradeComparison {
        let before = self.grade(old);
        let after = self.grade(new);
        let new_findings = unmatched(&after.findings, &before.findings);
        let fixed_findings = unmatched(&before.findings, &after.findings);
        let score_delta = i16::from(after.score) - i16::from(before.score);
        info!(
            "Comparison: {} → {} ({:+}), {} new, {} fixed",
            before.score,
            after.score,
            score_delta,
            new_findings.len(),
            fixed_findings.len()
        );
        GradeComparison {
            before,
            after,
            score_delta,
            new_findings,
            fixed_findings,
        }
    }

    fn report_progress(&self, stage: &str, percent: u8, note: Option<&str>) {
        let Some(callback) = &self.progress else {
            return;
        };
        match catch_unwind(AssertUnwindSafe(|| callback(stage, percent, note))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Progress callback failed at {}: {:#}", stage, e),
            Err(panic_info) => debug!(
                "Progress callback panicked at {}: {}",
                stage,
                panic_message(panic_info)
            ),
        }
    }
}

/// Builder for [`Grader`]
pub struct GraderBuilder {
    registry: Arc<RuleRegistry>,
    profiles: ProfileCatalog,
    selection: ProfileSelection,
    weights: CategoryWeights,
    passing_threshold: f64,
    adjuster: ScoreAdjuster,
    weighting: Option<Arc<dyn TargetWeighting>>,
    options: GraderOptions,
    progress: Option<ProgressCallback>,
}

impl Default for GraderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraderBuilder {
    pub fn new() -> Self {
        Self {
            registry: RuleRegistry::builtin(),
            profiles: ProfileCatalog::builtin(),
            selection: ProfileSelection::Fixed,
            weights: CategoryWeights::default(),
            passing_threshold: DEFAULT_PASSING_THRESHOLD,
            adjuster: ScoreAdjuster::builtin(),
            weighting: None,
            options: GraderOptions::default(),
            progress: None,
        }
    }

    /// Start from a configuration file's settings
    pub fn from_config(config: &GraderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let base = RuleRegistry::builtin();
        let registry = Arc::new(base.with_overrides(&config.rules)?);
        let profiles = ProfileCatalog::builtin().with_custom(&config.profiles, &registry)?;

        let adjustments = &config.adjustments;
        for interaction in &adjustments.interactions {
            for id in [&interaction.source, &interaction.target] {
                require_rule(&base, id)?;
            }
        }
        for ovr in &adjustments.overrides {
            require_rule(&base, &ovr.rule_id)?;
        }
        let mut interactions = if adjustments.builtin_interactions {
            builtin_interactions()
        } else {
            Vec::new()
        };
        interactions.extend(adjustments.interactions.iter().cloned());
        let adjuster = ScoreAdjuster::new(interactions, adjustments.overrides.clone())?;

        debug!(
            "Grader configured: {} rules, {} profiles, {} interactions",
            registry.len(),
            profiles.names().len(),
            adjuster.interactions().len()
        );

        Ok(Self {
            registry,
            profiles,
            selection: ProfileSelection::from_name(config.profile.as_deref()),
            weights: config.scoring.category_weights,
            passing_threshold: config.scoring.passing_threshold,
            adjuster,
            weighting: None,
            options: GraderOptions {
                parallel: config.defaults.parallel.unwrap_or(true),
            },
            progress: None,
        })
    }

    pub fn registry(mut self, registry: Arc<RuleRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn profiles(mut self, profiles: ProfileCatalog) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn profile(mut self, selection: ProfileSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn weights(mut self, weights: CategoryWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn passing_threshold(mut self, threshold: f64) -> Self {
        self.passing_threshold = threshold;
        self
    }

    pub fn adjuster(mut self, adjuster: ScoreAdjuster) -> Self {
        self.adjuster = adjuster;
        self
    }

    /// Per-target weighting for coverage (uniform by default)
    pub fn weighting(mut self, weighting: Arc<dyn TargetWeighting>) -> Self {
        self.weighting = Some(weighting);
        self
    }

    pub fn options(mut self, options: GraderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Validate the settings and build the grader
    pub fn build(self) -> Result<Grader, ConfigError> {
        let calculator = GradeCalculator::new(self.weights, self.passing_threshold)?;
        if let ProfileSelection::Named(name) = &self.selection {
            self.profiles.resolve(name)?;
        }
        let scorer = match self.weighting {
            Some(weighting) => CoverageScorer::new(weighting),
            None => CoverageScorer::default(),
        };
        Ok(Grader {
            registry: self.registry,
            profiles: self.profiles,
            selection: self.selection,
            calculator,
            adjuster: self.adjuster,
            scorer,
            classifier: PatternClassifier::new(),
            evaluator: RuleEvaluator::new(self.options.parallel),
            progress: self.progress,
        })
    }
}

fn require_rule(registry: &RuleRegistry, rule_id: &str) -> Result<(), ConfigError> {
    if registry.contains(rule_id) {
        Ok(())
    } else {
        Err(ConfigError::UnknownRule {
            context: "adjustments".to_string(),
            rule_id: rule_id.to_string(),
        })
    }
}

/// Grade with the built-in rules, weights and fixed gate
pub fn grade(doc: &Document) -> GradeResult {
    Grader::default().grade(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{LetterGrade, ScoreOverride};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn minimal() -> Document {
        Document::new(json!({
            "openapi": "3.0.3",
            "info": {"title": "t", "version": "1.0.0", "x-api-id": "acct_1699999999999_deadbeefcafebabe"},
            "servers": [{"url": "https://api.example.com/v1"}],
            "components": {"securitySchemes": {"bearer": {"type": "http", "scheme": "bearer"}}},
            "security": [{"bearer": []}],
            "paths": {"/users": {
                "parameters": [{"name": "X-Organization-ID", "in": "header", "required": true}],
                "get": {"responses": {"200": {"description": "ok"}}}
            }}
        }))
    }

    #[test]
    fn test_selection_from_name() {
        assert_eq!(ProfileSelection::from_name(None), ProfileSelection::Fixed);
        assert_eq!(ProfileSelection::from_name(Some("AUTO")), ProfileSelection::Auto);
        assert_eq!(
            ProfileSelection::from_name(Some("rest")),
            ProfileSelection::Named("rest".to_string())
        );
    }

    #[test]
    fn test_unknown_profile_is_config_error() {
        let result = Grader::builder()
            .profile(ProfileSelection::Named("nope".to_string()))
            .build();
        assert!(matches!(result, Err(ConfigError::UnknownProfile(name)) if name == "nope"));
    }

    #[test]
    fn test_stages_reported_in_order() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let grader = Grader::default().with_progress_callback(Box::new(move |stage, pct, _| {
            sink.lock().expect("lock").push((stage.to_string(), pct));
            Ok(())
        }));
        let result = grader.grade(&minimal());
        assert!(!result.blocked);
        let seen = stages.lock().expect("lock").clone();
        assert_eq!(
            seen,
            vec![
                (STAGE_PREREQUISITES.to_string(), 33),
                (STAGE_SCORING.to_string(), 66),
                (STAGE_GRADE.to_string(), 100)
            ]
        );
    }

    #[test]
    fn test_failing_progress_callback_is_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let grader = Grader::default().with_progress_callback(Box::new(move |stage, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            if stage == STAGE_SCORING {
                panic!("sink went away");
            }
            anyhow::bail!("transport closed")
        }));
        let expected = Grader::default().grade(&minimal());
        let result = grader.grade(&minimal());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.score, expected.score);
        assert_eq!(result.findings, expected.findings);
    }

    #[test]
    fn test_blocked_document_skips_scoring() {
        let doc = Document::new(json!({"openapi": "3.0.3", "info": {"title": "t", "version": "1"}, "paths": {}}));
        let result = grade(&doc);
        assert!(result.blocked);
        assert_eq!(result.score, 0);
        assert_eq!(result.letter_grade, LetterGrade::F);
        assert!(result.rule_scores.is_empty());
        assert!(result.findings.iter().any(|f| f.rule_id == "PREREQ-PATHS"));
    }

    #[test]
    fn test_named_profile_disables_rules() {
        let grader = Grader::builder()
            .profile(ProfileSelection::Named("grpc".to_string()))
            .build()
            .expect("grpc profile exists");
        let profile = grader.profiles().get("grpc").expect("builtin").clone();
        let result = grader.grade(&minimal());
        assert_eq!(result.profile.as_deref(), Some("grpc"));
        for disabled in &profile.disabled_rules {
            assert!(result.rule_score(disabled).is_none(), "{disabled} was scored");
        }
    }

    #[test]
    fn test_from_config_rejects_unknown_adjustment_rule() {
        let mut config = GraderConfig::default();
        config.adjustments.overrides.push(ScoreOverride {
            rule_id: "NOPE-1".to_string(),
            set: Some(0.0),
            cap: None,
            reason: None,
        });
        assert!(matches!(
            Grader::from_config(&config),
            Err(ConfigError::UnknownRule { rule_id, .. }) if rule_id == "NOPE-1"
        ));
    }

    #[test]
    fn test_compare_matches_by_fingerprint() {
        let old = minimal();
        let mut raw = old.root().clone();
        raw["paths"]["/users"]["get"]["summary"] = json!("List users");
        raw["paths"]["/users"]["get"]["operationId"] = json!("listUsers");
        let new = Document::new(raw);

        let comparison = Grader::default().compare(&old, &new);
        assert_eq!(
            comparison.score_delta,
            i16::from(comparison.after.score) - i16::from(comparison.before.score)
        );
        assert!(comparison.score_delta >= 0);
        assert!(!comparison.fixed_findings.is_empty());
        for fixed in &comparison.fixed_findings {
            assert!(!comparison.after.findings.contains(fixed));
        }
    }
}
