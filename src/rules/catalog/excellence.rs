//! Excellence rules: the extras that make an API pleasant to adopt

use super::{is_error_code, is_success_code, join, media_schemas, operation_targets_where, with_operation};
use crate::document::{ref_target, Document, Operation};
use crate::models::{Category, Severity};
use crate::rules::base::{Effort, Rule, Target, ValidationResult};
use serde_json::Value;

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "EXC-001",
            name: "Response examples",
            description: "Success response bodies come with examples",
            category: Category::Excellence,
            severity: Severity::Info,
            points: 2.0,
            effort: Effort::Small,
            remediation: "Add `example` (or `examples`) to the media type or its schema",
            detect: detect_success_bodies,
            validate: validate_examples,
        },
        Rule {
            id: "EXC-002",
            name: "Contact and license",
            description: "info declares a contact and a license",
            category: Category::Excellence,
            severity: Severity::Info,
            points: 2.0,
            effort: Effort::Trivial,
            remediation: "Add info.contact (team, email or URL) and info.license",
            detect: document_target,
            validate: validate_contact_license,
        },
        Rule {
            id: "EXC-003",
            name: "External documentation",
            description: "The document links to external documentation",
            category: Category::Excellence,
            severity: Severity::Info,
            points: 1.0,
            effort: Effort::Trivial,
            remediation: "Add a root-level externalDocs link to guides or a developer portal",
            detect: document_target,
            validate: validate_external_docs,
        },
        Rule {
            id: "EXC-004",
            name: "Idempotent creates",
            description: "POST operations accept an Idempotency-Key header",
            category: Category::Excellence,
            severity: Severity::Low,
            points: 2.0,
            effort: Effort::Small,
            remediation: "Accept an optional Idempotency-Key header so clients can retry safely",
            detect: detect_posts,
            validate: validate_idempotency_key,
        },
        Rule {
            id: "EXC-005",
            name: "Shared error model",
            description: "Error response bodies reference a shared component schema",
            category: Category::Excellence,
            severity: Severity::Low,
            points: 2.0,
            effort: Effort::Small,
            remediation: "Define one Error (or Problem) schema and reference it from every error response",
            detect: detect_error_bodies,
            validate: validate_shared_error_schema,
        },
        Rule {
            id: "EXC-006",
            name: "Deprecation guidance",
            description: "Deprecated operations announce a sunset date or a replacement",
            category: Category::Excellence,
            severity: Severity::Info,
            points: 1.0,
            effort: Effort::Trivial,
            remediation: "Add `x-sunset: <date>` and mention the replacement in the description",
            detect: detect_deprecated,
            validate: validate_deprecation,
        },
    ]
}

fn document_target(_doc: &Document) -> Vec<Target> {
    vec![Target::document()]
}

fn success_bodies<'a>(op: &Operation<'a>, doc: &'a Document) -> Vec<(&'a str, &'a Value)> {
    op.responses(doc)
        .into_iter()
        .filter(|(code, response)| is_success_code(code) && doc.content(response).is_some_and(|c| !c.is_empty()))
        .collect()
}

fn detect_success_bodies(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| !success_bodies(op, doc).is_empty())
}

fn has_example(doc: &Document, media: &Value) -> bool {
    if media.get("example").is_some() || media.get("examples").is_some() {
        return true;
    }
    media
        .get("schema")
        .and_then(|s| doc.deref(s))
        .is_some_and(|schema| schema.get("example").is_some() || schema.get("examples").is_some())
}

fn validate_examples(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let missing: Vec<&str> = success_bodies(&op, doc)
            .into_iter()
            .filter(|(_, response)| {
                doc.content(response)
                    .is_some_and(|content| content.values().any(|media| !has_example(doc, media)))
            })
            .map(|(code, _)| code)
            .collect();
        ValidationResult::check(
            missing.is_empty(),
            format!("{} responses have examples", target.label),
            format!("{} responses without examples: {}", target.label, join(&missing)),
        )
    })
}

fn validate_contact_license(_target: &Target, doc: &Document) -> ValidationResult {
    let info = doc.info();
    let mut missing = Vec::new();
    if !info.and_then(|i| i.get("contact")).is_some_and(Value::is_object) {
        missing.push("contact");
    }
    if !info.and_then(|i| i.get("license")).is_some_and(Value::is_object) {
        missing.push("license");
    }
    ValidationResult::check(
        missing.is_empty(),
        "info declares contact and license",
        format!("info is missing {}", join(&missing)),
    )
}

fn validate_external_docs(_target: &Target, doc: &Document) -> ValidationResult {
    let url = doc
        .root()
        .get("externalDocs")
        .and_then(|d| d.get("url"))
        .and_then(Value::as_str);
    ValidationResult::check(
        url.is_some_and(|u| !u.trim().is_empty()),
        "externalDocs is linked",
        "No root-level externalDocs link",
    )
}

fn detect_posts(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| op.method == "post")
}

fn validate_idempotency_key(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        ValidationResult::check(
            op.has_any_header(doc, &["Idempotency-Key"]),
            format!("{} accepts Idempotency-Key", target.label),
            format!("{} does not accept an Idempotency-Key header", target.label),
        )
    })
}

fn error_bodies<'a>(op: &Operation<'a>, doc: &'a Document) -> Vec<(&'a str, Option<&'a Value>)> {
    op.responses(doc)
        .into_iter()
        .filter(|(code, _)| is_error_code(code))
        .flat_map(|(code, response)| {
            media_schemas(doc, response)
                .into_iter()
                .map(move |(_, schema)| (code, schema))
        })
        .collect()
}

fn detect_error_bodies(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| !error_bodies(op, doc).is_empty())
}

fn validate_shared_error_schema(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let mut inline: Vec<&str> = error_bodies(&op, doc)
            .into_iter()
            .filter(|(_, schema)| !schema.is_some_and(|s| ref_target(s).is_some()))
            .map(|(code, _)| code)
            .collect();
        inline.dedup();
        ValidationResult::check(
            inline.is_empty(),
            format!("{} errors use the shared model", target.label),
            format!(
                "{} error responses without a shared schema: {}",
                target.label,
                join(&inline)
            ),
        )
    })
}

fn detect_deprecated(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| op.is_deprecated())
}

fn validate_deprecation(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let sunset = op.node.get("x-sunset").is_some();
        let explained = op
            .str_field("description")
            .is_some_and(|d| d.to_ascii_lowercase().contains("deprecat"));
        ValidationResult::check(
            sunset || explained,
            format!("{} explains its deprecation", target.label),
            format!("{} is deprecated without a sunset date or replacement", target.label),
        )
    })
}
