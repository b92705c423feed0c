//! Configuration module for apigrade
//!
//! This module handles:
//! - Project-level configuration (apigrade.toml)
//! - Rule overrides (enable/disable, severity, points)
//! - Scoring customization (category weights, passing threshold)
//! - Custom grading profiles and score adjustments
//!
//! Every configuration problem is a [`ConfigError`] and is reported once, at
//! load time. Grading itself never fails on configuration.

mod grader_config;

pub use grader_config::{
    load_config_file, load_grader_config, AdjustmentConfig, CliDefaults, GraderConfig,
    ScoringConfig, CONFIG_FILE_NAMES,
};

use crate::models::{Category, Severity};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("category weights must sum to 1.0 (got {sum:.4})")]
    InvalidWeights { sum: f64 },

    #[error("weight for {category} must be finite and non-negative (got {value})")]
    NegativeWeight { category: String, value: f64 },

    #[error("passing threshold must be between 0 and 100 (got {0})")]
    InvalidThreshold(f64),

    #[error("duplicate rule id {0}")]
    DuplicateRule(String),

    #[error("duplicate checkpoint id {0}")]
    DuplicateCheckpoint(String),

    #[error("invalid rule {rule_id}: {reason}")]
    InvalidRule { rule_id: String, reason: String },

    #[error("unknown rule {rule_id} in {context}")]
    UnknownRule { context: String, rule_id: String },

    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("rule interactions form a cycle through {0}")]
    InteractionCycle(String),

    #[error("invalid score adjustment for {rule_id}: {reason}")]
    InvalidOverride { rule_id: String, reason: String },
}

/// Per-rule override from `[rules.<ID>]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleOverride {
    /// Whether the rule is enabled (default: true)
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Override the default severity (critical, high, medium, low, info)
    #[serde(default)]
    pub severity: Option<Severity>,

    /// Override the points the rule is worth
    #[serde(default)]
    pub points: Option<f64>,

    /// Move the rule to another scored category
    #[serde(default)]
    pub category: Option<Category>,
}
