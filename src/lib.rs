//! apigrade - API description grading engine
//!
//! Grades an OpenAPI document in three stages: a prerequisite gate that can
//! block grading outright, weighted rule scoring by target coverage, and
//! aggregation into a 0-100 score with a letter grade. A separate weighted
//! checkpoint checklist and an API style classifier are available alongside.
//!
//! ```no_run
//! use apigrade::{Document, Grader};
//! use serde_json::json;
//!
//! let doc = Document::new(json!({"openapi": "3.0.3", "paths": {}}));
//! let result = Grader::default().grade(&doc);
//! println!("{} ({})", result.score, result.letter_grade);
//! ```

pub mod api_id;
pub mod checkpoints;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod document;
pub mod grader;
pub mod models;
pub mod prerequisites;
pub mod profiles;
pub mod reporters;
pub mod rules;
pub mod scoring;

pub use checkpoints::{run_checkpoints, CheckpointReport};
pub use classifier::{classify, ApiStyle, Classification};
pub use config::{ConfigError, GraderConfig};
pub use document::Document;
pub use grader::{grade, GradeComparison, Grader, GraderBuilder, ProfileSelection};
pub use models::{Category, Finding, Severity};
pub use prerequisites::{check_prerequisites, check_prerequisites_for_profile, PrerequisiteResult};
pub use scoring::{GradeResult, LetterGrade};
