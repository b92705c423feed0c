//! Core data models for apigrade
//!
//! These models are shared by the rule engine, the prerequisite gate,
//! the grade calculator and the reporters.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::str::FromStr;

/// Generate a deterministic finding fingerprint.
///
/// The fingerprint is a 16-character hex string derived from the rule id,
/// the location and the message. It is stable across runs and versions,
/// which lets two grading runs be compared finding by finding.
pub fn finding_fingerprint(rule_id: &str, location: &str, message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rule_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(location.as_bytes());
    hasher.update(b"\n");
    hasher.update(message.as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Severity levels for findings
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// Rule categories. `Prerequisite` rules gate grading and never contribute points.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Prerequisite,
    Security,
    Functionality,
    Scalability,
    Maintainability,
    Excellence,
}

impl Category {
    /// Categories that carry weight in the final grade, in report order
    pub const SCORED: [Category; 5] = [
        Category::Functionality,
        Category::Security,
        Category::Scalability,
        Category::Maintainability,
        Category::Excellence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Prerequisite => "prerequisite",
            Category::Security => "security",
            Category::Functionality => "functionality",
            Category::Scalability => "scalability",
            Category::Maintainability => "maintainability",
            Category::Excellence => "excellence",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prerequisite" => Ok(Category::Prerequisite),
            "security" => Ok(Category::Security),
            "functionality" => Ok(Category::Functionality),
            "scalability" => Ok(Category::Scalability),
            "maintainability" => Ok(Category::Maintainability),
            "excellence" => Ok(Category::Excellence),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

/// One reported validation failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    /// Location pointer into the document (e.g. `#/paths/~1users/get`)
    pub location: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
}

impl Finding {
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        category: Category,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            message: message.into(),
            location: location.into(),
            category,
            fix_hint: None,
        }
    }

    pub fn with_fix_hint(mut self, hint: Option<String>) -> Self {
        self.fix_hint = hint;
        self
    }

    pub fn fingerprint(&self) -> String {
        finding_fingerprint(&self.rule_id, &self.location, &self.message)
    }

    /// Global report ordering: severity (critical first), category, rule id, location.
    pub fn report_order(a: &Finding, b: &Finding) -> Ordering {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| a.location.cmp(&b.location))
            .then_with(|| a.message.cmp(&b.message))
    }
}

/// Sort findings into the deterministic report order
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(Finding::report_order);
}

/// Summary of findings by severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingsSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub total: usize,
}

impl FindingsSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self::default();
        for f in findings {
            match f.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Info => summary.info += 1,
            }
            summary.total += 1;
        }
        summary
    }
}
