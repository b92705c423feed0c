//! Built-in rule catalogue
//!
//! Each submodule contributes the rules of one category. Helpers here are
//! shared by several of them.

mod excellence;
mod functionality;
mod maintainability;
mod prerequisite;
mod scalability;
mod security;

pub use prerequisite::TENANT_HEADER;
pub(crate) use prerequisite::is_secure_url;
pub(crate) use scalability::PAGINATION_PARAMS;

use crate::document::{Document, Operation};
use crate::rules::base::{Rule, Target, ValidationResult};
use serde_json::{Map, Value};

/// Every built-in rule in catalogue order
pub fn builtin_rules() -> Vec<Rule> {
    let mut rules = prerequisite::rules();
    rules.extend(functionality::rules());
    rules.extend(security::rules());
    rules.extend(scalability::rules());
    rules.extend(maintainability::rules());
    rules.extend(excellence::rules());
    rules
}

/// One target per operation
fn operation_targets(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |_| true)
}

fn operation_targets_where(doc: &Document, keep: impl Fn(&Operation<'_>) -> bool) -> Vec<Target> {
    doc.operations()
        .iter()
        .filter(|op| keep(op))
        .map(Target::operation)
        .collect()
}

/// Resolve the operation behind `target` and validate it
fn with_operation(
    target: &Target,
    doc: &Document,
    check: impl FnOnce(Operation<'_>) -> ValidationResult,
) -> ValidationResult {
    match target.resolve_operation(doc) {
        Some(op) => check(op),
        None => ValidationResult::unresolved(target),
    }
}

pub(crate) fn is_success_code(code: &str) -> bool {
    code.starts_with('2')
}

pub(crate) fn is_error_code(code: &str) -> bool {
    code.starts_with('4') || code.starts_with('5') || code == "default"
}

/// Media types of a response or request body with their (unresolved) schemas
fn media_schemas<'a>(doc: &'a Document, node: &'a Value) -> Vec<(&'a str, Option<&'a Value>)> {
    doc.content(node)
        .map(|content| {
            content
                .iter()
                .map(|(media, obj)| (media.as_str(), obj.get("schema")))
                .collect()
        })
        .unwrap_or_default()
}

/// Schema of the preferred media type (JSON first), references resolved
pub(crate) fn primary_schema<'a>(doc: &'a Document, node: &'a Value) -> Option<&'a Value> {
    let schemas = media_schemas(doc, node);
    let preferred = schemas
        .iter()
        .find(|(media, schema)| media.contains("json") && schema.is_some())
        .or_else(|| schemas.iter().find(|(_, schema)| schema.is_some()))?;
    doc.deref(preferred.1?)
}

/// Properties of an object schema, references resolved
pub(crate) fn schema_properties<'a>(doc: &'a Document, schema: &'a Value) -> Option<&'a Map<String, Value>> {
    doc.deref(schema)?.get("properties").and_then(Value::as_object)
}

fn is_array_schema(doc: &Document, schema: &Value) -> bool {
    doc.deref(schema)
        .and_then(|s| s.get("type"))
        .and_then(Value::as_str)
        == Some("array")
}

/// Property names that conventionally wrap a page of results
const LIST_ENVELOPE_FIELDS: [&str; 4] = ["data", "items", "results", "records"];

/// A list response: a bare array or an envelope carrying one
pub(crate) fn is_list_schema(doc: &Document, schema: &Value) -> bool {
    if is_array_schema(doc, schema) {
        return true;
    }
    schema_properties(doc, schema).is_some_and(|props| {
        LIST_ENVELOPE_FIELDS
            .iter()
            .filter_map(|field| props.get(*field))
            .any(|prop| is_array_schema(doc, prop))
    })
}

/// The operation's success responses return a list
pub(crate) fn returns_list(op: &Operation<'_>, doc: &Document) -> bool {
    op.responses_in_class(doc, '2')
        .iter()
        .filter_map(|(_, response)| primary_schema(doc, response))
        .any(|schema| is_list_schema(doc, schema))
}

pub(crate) fn header_present(doc: &Document, response: &Value, names: &[&str]) -> bool {
    names.iter().any(|name| doc.response_has_header(response, name))
}

fn join(names: &[impl AsRef<str>]) -> String {
    names
        .iter()
        .map(|n| n.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}
