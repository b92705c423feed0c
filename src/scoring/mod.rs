//! Scoring
//!
//! Turns rule outcomes into a final grade in three steps:
//!
//! ```text
//! rule score     = coverage × points            (coverage: weighted pass ratio)
//! adjusted score = adjust(rule scores)          (overrides, rule interactions)
//! final score    = round(Σ category% × weight × 100)
//! ```
//!
//! # Category weights (defaults)
//!
//! - Functionality: 0.30
//! - Security: 0.25
//! - Scalability: 0.20
//! - Maintainability: 0.15
//! - Excellence: 0.10
//!
//! Letter grades follow the usual A+ (97) .. D- (60) bands; anything lower is F.

mod adjuster;
mod coverage;
mod grade;

pub use adjuster::{
    builtin_interactions, InteractionKind, RuleInteraction, ScoreAdjuster, ScoreOverride,
};
pub use coverage::{CoverageScorer, RuleScore, TargetWeighting, UniformWeighting};
pub use grade::{
    CategoryScore, CategoryWeights, GradeCalculator, GradeResult, LetterGrade,
    DEFAULT_PASSING_THRESHOLD, EXCELLENCE_THRESHOLD,
};
