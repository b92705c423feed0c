//! Maintainability rules: naming, tagging, documentation, reuse

use super::{is_success_code, join, media_schemas, operation_targets, operation_targets_where, with_operation};
use crate::document::{is_version_segment, ref_target, Document};
use crate::models::{Category, Severity};
use crate::rules::base::{Effort, Rule, Target, TargetKind, ValidationResult};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

static SEMVER: OnceLock<Regex> = OnceLock::new();
static KEBAB_SEGMENT: OnceLock<Regex> = OnceLock::new();

fn semver() -> &'static Regex {
    SEMVER.get_or_init(|| {
        Regex::new(r"^\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?$")
            .expect("semver pattern is valid")
    })
}

fn kebab_segment() -> &'static Regex {
    KEBAB_SEGMENT.get_or_init(|| {
        Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("path segment pattern is valid")
    })
}

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "MAINT-001",
            name: "Operations summarized",
            description: "Every operation has a summary or description",
            category: Category::Maintainability,
            severity: Severity::Low,
            points: 3.0,
            effort: Effort::Trivial,
            remediation: "Add a one-line summary to the operation",
            detect: operation_targets,
            validate: validate_operation_summary,
        },
        Rule {
            id: "MAINT-002",
            name: "Operations tagged",
            description: "Every operation is tagged, using only tags declared at the top level",
            category: Category::Maintainability,
            severity: Severity::Low,
            points: 3.0,
            effort: Effort::Trivial,
            remediation: "Tag the operation and declare the tag (with a description) under `tags`",
            detect: operation_targets,
            validate: validate_operation_tags,
        },
        Rule {
            id: "MAINT-003",
            name: "Schemas described",
            description: "Component schemas carry a description",
            category: Category::Maintainability,
            severity: Severity::Low,
            points: 2.0,
            effort: Effort::Trivial,
            remediation: "Describe what the schema represents",
            detect: detect_schemas,
            validate: validate_schema_description,
        },
        Rule {
            id: "MAINT-004",
            name: "Parameters described",
            description: "Every parameter an operation accepts has a description",
            category: Category::Maintainability,
            severity: Severity::Low,
            points: 2.0,
            effort: Effort::Trivial,
            remediation: "Describe each parameter's meaning and format",
            detect: detect_parameterized,
            validate: validate_parameter_descriptions,
        },
        Rule {
            id: "MAINT-005",
            name: "Consistent path naming",
            description: "Literal path segments are lowercase kebab-case without trailing slashes",
            category: Category::Maintainability,
            severity: Severity::Low,
            points: 2.0,
            effort: Effort::Medium,
            remediation: "Rename segments to lowercase kebab-case, e.g. /order-lines",
            detect: detect_paths,
            validate: validate_path_naming,
        },
        Rule {
            id: "MAINT-006",
            name: "Semantic version",
            description: "info.version follows semantic versioning",
            category: Category::Maintainability,
            severity: Severity::Medium,
            points: 2.0,
            effort: Effort::Trivial,
            remediation: "Use MAJOR.MINOR.PATCH, e.g. `2.1.0`",
            detect: document_target,
            validate: validate_semver,
        },
        Rule {
            id: "MAINT-007",
            name: "Reusable response schemas",
            description: "Success response bodies reference shared component schemas",
            category: Category::Maintainability,
            severity: Severity::Low,
            points: 2.0,
            effort: Effort::Small,
            remediation: "Move inline response schemas to components.schemas and reference them",
            detect: detect_typed_success,
            validate: validate_reusable_schemas,
        },
    ]
}

fn document_target(_doc: &Document) -> Vec<Target> {
    vec![Target::document()]
}

fn validate_operation_summary(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        ValidationResult::check(
            op.str_field("summary").is_some() || op.str_field("description").is_some(),
            format!("{} is documented", target.label),
            format!("{} has neither summary nor description", target.label),
        )
    })
}

fn validate_operation_tags(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let tags = op.tags();
        if tags.is_empty() {
            return ValidationResult::fail(format!("{} has no tags", target.label));
        }
        let declared = doc.declared_tags();
        let undeclared: Vec<&str> = tags.into_iter().filter(|t| !declared.contains(t)).collect();
        ValidationResult::check(
            undeclared.is_empty(),
            format!("{} uses declared tags", target.label),
            format!("{} uses undeclared tags: {}", target.label, join(&undeclared)),
        )
    })
}

fn detect_schemas(doc: &Document) -> Vec<Target> {
    doc.schemas()
        .iter()
        .map(|(name, _)| Target::schema(name))
        .collect()
}

fn validate_schema_description(target: &Target, doc: &Document) -> ValidationResult {
    let Some(schema) = doc.resolve_ref(&target.location) else {
        return ValidationResult::unresolved(target);
    };
    // Aliases inherit the description of what they point at
    let described = ref_target(schema).is_some()
        || schema
            .get("description")
            .and_then(Value::as_str)
            .is_some_and(|d| !d.trim().is_empty());
    ValidationResult::check(
        described,
        format!("{} is described", target.label),
        format!("{} has no description", target.label),
    )
}

fn detect_parameterized(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| !op.effective_parameters(doc).is_empty())
}

fn validate_parameter_descriptions(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let undocumented: Vec<&str> = op
            .effective_parameters(doc)
            .iter()
            .filter(|p| p.resolved.is_some() && p.description().is_none())
            .map(|p| p.name().unwrap_or("(unnamed)"))
            .collect();
        ValidationResult::check(
            undocumented.is_empty(),
            format!("{} parameters are described", target.label),
            format!(
                "{} has undocumented parameters: {}",
                target.label,
                join(&undocumented)
            ),
        )
    })
}

fn detect_paths(doc: &Document) -> Vec<Target> {
    doc.paths().iter().map(|(path, _)| Target::path(path)).collect()
}

fn validate_path_naming(target: &Target, _doc: &Document) -> ValidationResult {
    let TargetKind::Path { path } = &target.kind else {
        return ValidationResult::unresolved(target);
    };
    if path.len() > 1 && path.ends_with('/') {
        return ValidationResult::fail(format!("{path} has a trailing slash"));
    }
    let offending: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && !s.starts_with('{') && !is_version_segment(s))
        // `/things:batchGet` style custom methods are judged on the resource part
        .map(|s| s.split(':').next().unwrap_or(s))
        .filter(|s| !kebab_segment().is_match(s))
        .collect();
    ValidationResult::check(
        offending.is_empty(),
        format!("{path} uses kebab-case segments"),
        format!("{path} has segments that are not lowercase kebab-case: {}", join(&offending)),
    )
}

fn validate_semver(_target: &Target, doc: &Document) -> ValidationResult {
    match doc.info_str("version") {
        Some(v) => ValidationResult::check(
            semver().is_match(v),
            format!("info.version '{v}' is semantic"),
            format!("info.version '{v}' is not a semantic version"),
        ),
        None => ValidationResult::fail("info.version is missing"),
    }
}

fn success_schemas<'a>(op: &crate::document::Operation<'a>, doc: &'a Document) -> Vec<(&'a str, &'a Value)> {
    op.responses(doc)
        .into_iter()
        .filter(|(code, _)| is_success_code(code))
        .flat_map(|(code, response)| {
            media_schemas(doc, response)
                .into_iter()
                .filter_map(move |(_, schema)| schema.map(|s| (code, s)))
        })
        .collect()
}

fn detect_typed_success(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| !success_schemas(op, doc).is_empty())
}

/// A `$ref`, or an array whose items are a `$ref`
fn is_reusable(schema: &Value) -> bool {
    ref_target(schema).is_some()
        || (schema.get("type").and_then(Value::as_str) == Some("array")
            && schema
                .get("items")
                .is_some_and(|items| ref_target(items).is_some()))
}

fn validate_reusable_schemas(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let mut inline: Vec<&str> = success_schemas(&op, doc)
            .into_iter()
            .filter(|(_, schema)| !is_reusable(schema))
            .map(|(code, _)| code)
            .collect();
        inline.dedup();
        ValidationResult::check(
            inline.is_empty(),
            format!("{} reuses component schemas", target.label),
            format!("{} has inline response schemas for {}", target.label, join(&inline)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcomes(id: &str, doc: &Document) -> Vec<(String, bool)> {
        let rule = rules().into_iter().find(|r| r.id == id).expect("rule");
        (rule.detect)(doc)
            .iter()
            .map(|t| (t.label.clone(), (rule.validate)(t, doc).passed))
            .collect()
    }

    #[test]
    fn test_path_naming() {
        let doc = Document::new(json!({
            "paths": {
                "/v1/order-lines/{lineId}": {},
                "/v1/orderLines": {},
                "/users/": {},
                "/users:batchGet": {},
                "/Users": {}
            }
        }));
        assert_eq!(
            outcomes("MAINT-005", &doc),
            vec![
                ("/Users".to_string(), false),
                ("/users/".to_string(), false),
                ("/users:batchGet".to_string(), true),
                ("/v1/order-lines/{lineId}".to_string(), true),
                ("/v1/orderLines".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_semver() {
        for (version, ok) in [("1.0.0", true), ("2.1.0-beta.1", true), ("v1", false), ("1.0", false)] {
            let doc = Document::new(json!({"info": {"version": version}}));
            assert_eq!(outcomes("MAINT-006", &doc)[0].1, ok, "{version}");
        }
    }

    #[test]
    fn test_tags_must_be_declared() {
        let doc = Document::new(json!({
            "tags": [{"name": "users"}],
            "paths": {
                "/a": {"get": {"tags": ["users"]}},
                "/b": {"get": {"tags": ["users", "billing"]}},
                "/c": {"get": {}}
            }
        }));
        let passed: Vec<bool> = outcomes("MAINT-002", &doc).into_iter().map(|(_, p)| p).collect();
        assert_eq!(passed, vec![true, false, false]);
    }

    #[test]
    fn test_reusable_response_schemas() {
        let doc = Document::new(json!({
            "paths": {
                "/a": {"get": {"responses": {"200": {"content": {"application/json": {
                    "schema": {"type": "array", "items": {"$ref": "#/components/schemas/A"}}
                }}}}}},
                "/b": {"get": {"responses": {"200": {"content": {"application/json": {
                    "schema": {"type": "object"}
                }}}}}},
                "/c": {"delete": {"responses": {"204": {}}}}
            }
        }));
        assert_eq!(
            outcomes("MAINT-007", &doc),
            vec![("GET /a".to_string(), true), ("GET /b".to_string(), false)]
        );
    }

    #[test]
    fn test_parameter_descriptions_include_inherited() {
        let doc = Document::new(json!({
            "paths": {"/a/{id}": {
                "parameters": [{"name": "id", "in": "path", "required": true}],
                "get": {"parameters": [{"name": "q", "in": "query", "description": "search"}]}
            }}
        }));
        assert_eq!(outcomes("MAINT-004", &doc), vec![("GET /a/{id}".to_string(), false)]);
    }
}
