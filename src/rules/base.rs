//! Rule value objects and their inputs/outputs
//!
//! A rule is plain data plus two pure functions:
//! - `detect(doc)` lists the targets the rule applies to
//! - `validate(target, doc)` decides pass/fail for one target
//!
//! Neither function may mutate the document or perform I/O.

use crate::document::{pointer, Document, Operation};
use crate::models::{Category, Severity};
use serde::{Deserialize, Serialize};

pub type DetectFn = fn(&Document) -> Vec<Target>;
pub type ValidateFn = fn(&Target, &Document) -> ValidationResult;

/// Rough remediation effort shown next to a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Trivial,
    Small,
    Medium,
    Large,
}

impl std::fmt::Display for Effort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effort::Trivial => write!(f, "trivial"),
            Effort::Small => write!(f, "small"),
            Effort::Medium => write!(f, "medium"),
            Effort::Large => write!(f, "large"),
        }
    }
}

/// A declarative, weighted, categorized test
#[derive(Debug, Clone)]
pub struct Rule {
    /// Stable identifier (e.g. `SEC-002`)
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub severity: Severity,
    /// Maximum score for this rule
    pub points: f64,
    pub effort: Effort,
    /// Default remediation hint when a validation supplies none
    pub remediation: &'static str,
    pub detect: DetectFn,
    pub validate: ValidateFn,
}

impl Rule {
    pub fn is_prerequisite(&self) -> bool {
        self.category == Category::Prerequisite
    }
}

/// What kind of document node a target addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetKind {
    Document,
    Path { path: String },
    Operation { path: String, method: String },
    Schema { name: String },
    SecurityScheme { name: String },
    Server { index: usize },
    /// Any other node, addressed by raw pointer segments
    Node { segments: Vec<String> },
}

/// One addressable unit examined by a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    /// Human identifier, e.g. `GET /users`
    pub label: String,
    /// Location pointer, e.g. `#/paths/~1users/get`
    pub location: String,
}

impl Target {
    pub fn document() -> Self {
        Self {
            kind: TargetKind::Document,
            label: "document".to_string(),
            location: "#".to_string(),
        }
    }

    pub fn operation(op: &Operation<'_>) -> Self {
        Self {
            kind: TargetKind::Operation {
                path: op.path.to_string(),
                method: op.method.to_string(),
            },
            label: op.label(),
            location: op.location(),
        }
    }

    pub fn path(path: &str) -> Self {
        Self {
            kind: TargetKind::Path {
                path: path.to_string(),
            },
            label: path.to_string(),
            location: pointer::pointer_for(&["paths", path]),
        }
    }

    pub fn schema(name: &str) -> Self {
        Self {
            kind: TargetKind::Schema {
                name: name.to_string(),
            },
            label: format!("schema {name}"),
            location: pointer::pointer_for(&["components", "schemas", name]),
        }
    }

    pub fn security_scheme(name: &str) -> Self {
        Self {
            kind: TargetKind::SecurityScheme {
                name: name.to_string(),
            },
            label: format!("security scheme {name}"),
            location: pointer::pointer_for(&["components", "securitySchemes", name]),
        }
    }

    pub fn server(index: usize, url: &str) -> Self {
        Self {
            kind: TargetKind::Server { index },
            label: format!("server {url}"),
            location: pointer::pointer_for(&["servers", &index.to_string()]),
        }
    }

    pub fn node(label: impl Into<String>, segments: &[&str]) -> Self {
        Self {
            kind: TargetKind::Node {
                segments: segments.iter().map(|s| s.to_string()).collect(),
            },
            label: label.into(),
            location: pointer::pointer_for(segments),
        }
    }

    /// Re-locate an operation target in the document
    pub fn resolve_operation<'a>(&self, doc: &'a Document) -> Option<Operation<'a>> {
        match &self.kind {
            TargetKind::Operation { path, method } => doc.operation(path, method),
            _ => None,
        }
    }

    /// Re-locate the addressed node (references followed)
    pub fn resolve_node<'a>(&self, doc: &'a Document) -> Option<&'a serde_json::Value> {
        let node = match &self.kind {
            TargetKind::Document => Some(doc.root()),
            TargetKind::Operation { .. } => self.resolve_operation(doc).map(|op| op.node),
            TargetKind::Node { segments } => doc.get(segments),
            _ => doc.resolve_ref(&self.location),
        }?;
        doc.deref(node)
    }
}

/// Outcome of validating one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
}

impl ValidationResult {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            fix_hint: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            fix_hint: None,
        }
    }

    /// Pass or fail depending on `condition`
    pub fn check(condition: bool, ok: impl Into<String>, failed: impl Into<String>) -> Self {
        if condition {
            Self::pass(ok)
        } else {
            Self::fail(failed)
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// A target that disappeared between detect and validate
    pub fn unresolved(target: &Target) -> Self {
        Self::fail(format!("{} could not be located in the document", target.label))
    }
}
