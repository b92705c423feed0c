//! Rules: declarative, weighted checks over a specification document
//!
//! Each rule lists the targets it applies to and validates them one by one.
//! The catalogue is grouped by category:
//!
//! - **Prerequisite**: gate checks that block grading when they fail
//! - **Functionality**: operations are usable and well-formed
//! - **Security**: authentication, transport and credential handling
//! - **Scalability**: pagination, rate limiting, caching, async work
//! - **Maintainability**: naming, tagging, documentation, reuse
//! - **Excellence**: examples, idempotency, lifecycle metadata

pub mod base;
mod catalog;
pub mod engine;
pub mod registry;

pub use base::{DetectFn, Effort, Rule, Target, TargetKind, ValidateFn, ValidationResult};
pub use catalog::{builtin_rules, TENANT_HEADER};
pub(crate) use catalog::{
    header_present, is_error_code, is_list_schema, is_secure_url, is_success_code, primary_schema,
    returns_list, schema_properties, PAGINATION_PARAMS,
};
pub use engine::{RuleEvaluator, RuleOutcome, TargetOutcome};
pub use registry::RuleRegistry;
