//! Category aggregation and letter grades

use crate::config::ConfigError;
use crate::models::{sort_findings, Category, Finding, FindingsSummary};
use crate::prerequisites::PrerequisiteResult;
use crate::scoring::RuleScore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_PASSING_THRESHOLD: f64 = 70.0;

/// Score at which a result is flagged as excellent
pub const EXCELLENCE_THRESHOLD: u8 = 90;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Share of the final score carried by each category. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    #[serde(default = "default_functionality")]
    pub functionality: f64,
    #[serde(default = "default_security")]
    pub security: f64,
    #[serde(default = "default_scalability")]
    pub scalability: f64,
    #[serde(default = "default_maintainability")]
    pub maintainability: f64,
    #[serde(default = "default_excellence")]
    pub excellence: f64,
}

fn default_functionality() -> f64 {
    0.30
}
fn default_security() -> f64 {
    0.25
}
fn default_scalability() -> f64 {
    0.20
}
fn default_maintainability() -> f64 {
    0.15
}
fn default_excellence() -> f64 {
    0.10
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            functionality: default_functionality(),
            security: default_security(),
            scalability: default_scalability(),
            maintainability: default_maintainability(),
            excellence: default_excellence(),
        }
    }
}

impl CategoryWeights {
    /// Weight for a scored category; prerequisites weigh nothing
    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::Functionality => self.functionality,
            Category::Security => self.security,
            Category::Scalability => self.scalability,
            Category::Maintainability => self.maintainability,
            Category::Excellence => self.excellence,
            Category::Prerequisite => 0.0,
        }
    }

    pub fn sum(&self) -> f64 {
        Category::SCORED.iter().map(|c| self.weight(*c)).sum()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for category in Category::SCORED {
            let value = self.weight(category);
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NegativeWeight {
                    category: category.to_string(),
                    value,
                });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::InvalidWeights { sum });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    D,
    #[serde(rename = "D-")]
    DMinus,
    F,
}

/// Descending thresholds; the first one met wins
const GRADE_TABLE: [(u8, LetterGrade); 12] = [
    (97, LetterGrade::APlus),
    (93, LetterGrade::A),
    (90, LetterGrade::AMinus),
    (87, LetterGrade::BPlus),
    (83, LetterGrade::B),
    (80, LetterGrade::BMinus),
    (77, LetterGrade::CPlus),
    (73, LetterGrade::C),
    (70, LetterGrade::CMinus),
    (67, LetterGrade::DPlus),
    (63, LetterGrade::D),
    (60, LetterGrade::DMinus),
];

impl LetterGrade {
    pub fn from_score(score: u8) -> Self {
        GRADE_TABLE
            .iter()
            .find(|(min, _)| score >= *min)
            .map(|(_, grade)| *grade)
            .unwrap_or(LetterGrade::F)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::AMinus => "A-",
            LetterGrade::BPlus => "B+",
            LetterGrade::B => "B",
            LetterGrade::BMinus => "B-",
            LetterGrade::CPlus => "C+",
            LetterGrade::C => "C",
            LetterGrade::CMinus => "C-",
            LetterGrade::DPlus => "D+",
            LetterGrade::D => "D",
            LetterGrade::DMinus => "D-",
            LetterGrade::F => "F",
        }
    }
}

impl std::fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One category's contribution to the final score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    pub earned: f64,
    pub maximum: f64,
    /// earned / maximum, in [0, 1]
    pub percentage: f64,
    pub weight: f64,
    /// percentage × weight × 100
    pub weighted_score: f64,
    pub rules: Vec<String>,
}

/// Final grading outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
    /// Integer score in [0, 100]
    pub score: u8,
    pub letter_grade: LetterGrade,
    pub passed: bool,
    /// The prerequisite gate stopped grading
    pub blocked: bool,
    pub excellence: bool,
    pub breakdown: Vec<CategoryScore>,
    /// Every finding, in report order
    pub findings: Vec<Finding>,
    pub summary: FindingsSummary,
    pub rule_scores: Vec<RuleScore>,
    pub prerequisites: PrerequisiteResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub passing_threshold: f64,
}

impl GradeResult {
    pub fn category(&self, category: Category) -> Option<&CategoryScore> {
        self.breakdown.iter().find(|c| c.category == category)
    }

    pub fn rule_score(&self, rule_id: &str) -> Option<&RuleScore> {
        self.rule_scores.iter().find(|s| s.rule_id == rule_id)
    }
}

/// Aggregates rule scores into a grade
#[derive(Debug, Clone, PartialEq)]
pub struct GradeCalculator {
    weights: CategoryWeights,
    passing_threshold: f64,
}

impl Default for GradeCalculator {
    fn default() -> Self {
        Self {
            weights: CategoryWeights::default(),
            passing_threshold: DEFAULT_PASSING_THRESHOLD,
        }
    }
}

impl GradeCalculator {
    pub fn new(weights: CategoryWeights, passing_threshold: f64) -> Result<Self, ConfigError> {
        weights.validate()?;
        if !passing_threshold.is_finite() || !(0.0..=100.0).contains(&passing_threshold) {
            return Err(ConfigError::InvalidThreshold(passing_threshold));
        }
        Ok(Self {
            weights,
            passing_threshold,
        })
    }

    pub fn weights(&self) -> &CategoryWeights {
        &self.weights
    }

    pub fn passing_threshold(&self) -> f64 {
        self.passing_threshold
    }

    /// Per-category totals, in report order
    pub fn breakdown(&self, scores: &[RuleScore]) -> Vec<CategoryScore> {
        Category::SCORED
            .iter()
            .map(|&category| {
                let rules: Vec<&RuleScore> =
                    scores.iter().filter(|s| s.category == category).collect();
                let earned: f64 = rules.iter().map(|s| s.score).sum();
                let maximum: f64 = rules.iter().map(|s| s.max_score).sum();
                let percentage = if maximum > 0.0 {
                    (earned / maximum).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let weight = self.weights.weight(category);
                CategoryScore {
                    category,
                    earned,
                    maximum,
                    percentage,
                    weight,
                    weighted_score: percentage * weight * 100.0,
                    rules: rules.iter().map(|s| s.rule_id.clone()).collect(),
                }
            })
            .collect()
    }

    /// Grade a document whose prerequisites were checked.
    /// A failed gate yields [`GradeCalculator::blocked`] and the scores are ignored.
    pub fn calculate(
        &self,
        rule_scores: Vec<RuleScore>,
        prerequisites: PrerequisiteResult,
        profile: Option<String>,
    ) -> GradeResult {
        if !prerequisites.passed {
            return self.blocked(prerequisites, profile);
        }

        let rule_scores: Vec<RuleScore> = rule_scores
            .into_iter()
            .filter(|s| s.category != Category::Prerequisite)
            .collect();
        let breakdown = self.breakdown(&rule_scores);
        let total: f64 = breakdown.iter().map(|c| c.weighted_score).sum();
        let score = total.round().clamp(0.0, 100.0) as u8;
        let letter_grade = LetterGrade::from_score(score);

        let mut findings: Vec<Finding> = rule_scores
            .iter()
            .flat_map(|s| s.findings.iter().cloned())
            .collect();
        sort_findings(&mut findings);

        let passed = f64::from(score) >= self.passing_threshold;
        info!(
            "Grade: {} ({}) - {}",
            score,
            letter_grade,
            if passed { "passed" } else { "failed" }
        );
        debug!("Category breakdown: {:?}", breakdown);

        GradeResult {
            score,
            letter_grade,
            passed,
            blocked: false,
            excellence: score >= EXCELLENCE_THRESHOLD,
            breakdown,
            summary: FindingsSummary::from_findings(&findings),
            findings,
            rule_scores,
            prerequisites,
            profile,
            passing_threshold: self.passing_threshold,
        }
    }

    /// Result for a document that failed the prerequisite gate
    pub fn blocked(&self, prerequisites: PrerequisiteResult, profile: Option<String>) -> GradeResult {
        let findings = prerequisites.failures.clone();
        GradeResult {
            score: 0,
            letter_grade: LetterGrade::F,
            passed: false,
            blocked: true,
            excellence: false,
            breakdown: Vec::new(),
            summary: FindingsSummary::from_findings(&findings),
            findings,
            rule_scores: Vec::new(),
            prerequisites,
            profile,
            passing_threshold: self.passing_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn rule_score(id: &str, category: Category, score: f64, max: f64) -> RuleScore {
        RuleScore {
            rule_id: id.to_string(),
            name: id.to_string(),
            category,
            max_score: max,
            coverage: if max > 0.0 { score / max } else { 1.0 },
            score,
            targets_checked: 1,
            targets_passed: 1,
            applicable: true,
            faulted: false,
            findings: Vec::new(),
            adjustments: Vec::new(),
        }
    }

    fn gate(passed: bool) -> PrerequisiteResult {
        PrerequisiteResult {
            passed,
            ..Default::default()
        }
    }

    #[test]
    fn test_letter_grade_table_is_gapless() {
        assert_eq!(LetterGrade::from_score(100), LetterGrade::APlus);
        assert_eq!(LetterGrade::from_score(97), LetterGrade::APlus);
        assert_eq!(LetterGrade::from_score(96), LetterGrade::A);
        assert_eq!(LetterGrade::from_score(90), LetterGrade::AMinus);
        assert_eq!(LetterGrade::from_score(70), LetterGrade::CMinus);
        assert_eq!(LetterGrade::from_score(60), LetterGrade::DMinus);
        assert_eq!(LetterGrade::from_score(59), LetterGrade::F);
        assert_eq!(LetterGrade::from_score(0), LetterGrade::F);
        for score in 0..=100u8 {
            let _ = LetterGrade::from_score(score);
        }
    }

    #[test]
    fn test_default_weights_are_valid() {
        assert!(CategoryWeights::default().validate().is_ok());
        let bad = CategoryWeights {
            functionality: 0.5,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::InvalidWeights { .. })));
        let negative = CategoryWeights {
            functionality: 0.6,
            security: -0.05,
            ..Default::default()
        };
        assert!(matches!(negative.validate(), Err(ConfigError::NegativeWeight { .. })));
        assert!(GradeCalculator::new(CategoryWeights::default(), 101.0).is_err());
    }

    #[test]
    fn test_weighted_aggregation() {
        let scores = vec![
            rule_score("FUNC-1", Category::Functionality, 10.0, 10.0),
            rule_score("SEC-1", Category::Security, 5.0, 10.0),
            rule_score("SCALE-1", Category::Scalability, 10.0, 10.0),
            rule_score("MAINT-1", Category::Maintainability, 10.0, 10.0),
            rule_score("EXC-1", Category::Excellence, 0.0, 10.0),
        ];
        let result = GradeCalculator::default().calculate(scores, gate(true), None);
        // 30 + 12.5 + 20 + 15 + 0 = 77.5
        assert_eq!(result.score, 78);
        assert_eq!(result.letter_grade, LetterGrade::CPlus);
        assert!(result.passed);
        assert!(!result.excellence);
        let security = result.category(Category::Security).expect("security");
        assert_eq!(security.percentage, 0.5);
    }

    #[test]
    fn test_empty_category_contributes_nothing() {
        let scores = vec![rule_score("FUNC-1", Category::Functionality, 10.0, 10.0)];
        let result = GradeCalculator::default().calculate(scores, gate(true), None);
        assert_eq!(result.score, 30);
        assert!(!result.passed);
    }

    #[test]
    fn test_blocked_result() {
        let mut prerequisites = gate(false);
        prerequisites.failures.push(Finding::new(
            "PREREQ-PATHS",
            Severity::Critical,
            Category::Prerequisite,
            "#/paths",
            "no operations",
        ));
        let scores = vec![rule_score("FUNC-1", Category::Functionality, 10.0, 10.0)];
        let result = GradeCalculator::default().calculate(scores, prerequisites, None);
        assert!(result.blocked);
        assert!(!result.passed);
        assert_eq!(result.score, 0);
        assert_eq!(result.letter_grade, LetterGrade::F);
        assert!(result.breakdown.is_empty());
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.summary.critical, 1);
    }

    #[test]
    fn test_letter_grade_serializes_as_symbol() {
        assert_eq!(
            serde_json::to_string(&LetterGrade::APlus).expect("serializes"),
            "\"A+\""
        );
    }
}
