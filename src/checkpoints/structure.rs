//! Document structure, servers and tags

use super::{
    every_operation, none_failing, text_field, CheckOutcome, Checkpoint, CheckpointCategory,
};
use crate::document::{is_version_segment, Document};
use crate::rules::is_secure_url;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;

static SEMVER: OnceLock<Regex> = OnceLock::new();

fn semver() -> &'static Regex {
    SEMVER.get_or_init(|| {
        Regex::new(r"^\d+\.\d+\.\d+(-[0-9A-Za-z.-]+)?(\+[0-9A-Za-z.-]+)?$")
            .expect("semver pattern is valid")
    })
}

pub(super) fn checkpoints() -> Vec<Checkpoint> {
    use CheckpointCategory::{Servers, Structure, Tags};
    vec![
        Checkpoint::new("STR-01", Structure, 2, "OpenAPI 3.x version declared", openapi_version).auto_fail(),
        Checkpoint::new("STR-02", Structure, 1, "info.title present", info_title),
        Checkpoint::new("STR-03", Structure, 2, "info.version is semantic", info_version),
        Checkpoint::new("STR-04", Structure, 1, "info.description present", info_description),
        Checkpoint::new("STR-05", Structure, 2, "At least one operation", has_operations).auto_fail(),
        Checkpoint::new("STR-06", Structure, 2, "Unique operationIds on every operation", operation_ids),
        Checkpoint::new("STR-07", Structure, 1, "Reusable schemas under components", component_schemas),
        Checkpoint::new("STR-08", Structure, 1, "Every local $ref resolves", refs_resolve),
        Checkpoint::new("SRV-01", Servers, 1, "Servers declared", servers_declared),
        Checkpoint::new("SRV-02", Servers, 2, "Servers use HTTPS", servers_https).auto_fail(),
        Checkpoint::new("SRV-03", Servers, 1, "Server URLs carry a major version", servers_versioned),
        Checkpoint::new("SRV-04", Servers, 1, "Servers are described", servers_described),
        Checkpoint::new("TAG-01", Tags, 1, "Top-level tags declared", tags_declared),
        Checkpoint::new("TAG-02", Tags, 1, "Declared tags are described", tags_described),
        Checkpoint::new("TAG-03", Tags, 1, "Every operation is tagged", operations_tagged),
        Checkpoint::new("TAG-04", Tags, 1, "Operation tags are declared", operation_tags_declared),
    ]
}

fn openapi_version(doc: &Document) -> CheckOutcome {
    match doc.root().get("openapi").and_then(Value::as_str) {
        Some(v) if v.starts_with("3.") => CheckOutcome::pass(format!("OpenAPI {v}")),
        Some(v) => CheckOutcome::fail(format!("unsupported OpenAPI version {v}")),
        None => CheckOutcome::fail("openapi version field missing"),
    }
}

fn info_title(doc: &Document) -> CheckOutcome {
    CheckOutcome::check(
        doc.info_str("title").is_some(),
        "title present",
        "info.title missing",
    )
}

fn info_version(doc: &Document) -> CheckOutcome {
    match doc.info_str("version") {
        Some(v) if semver().is_match(v) => CheckOutcome::pass(format!("version {v}")),
        Some(v) => CheckOutcome::fail(format!("version '{v}' is not semantic (MAJOR.MINOR.PATCH)")),
        None => CheckOutcome::fail("info.version missing"),
    }
}

fn info_description(doc: &Document) -> CheckOutcome {
    CheckOutcome::check(
        doc.info_str("description").is_some(),
        "description present",
        "info.description missing",
    )
}

fn has_operations(doc: &Document) -> CheckOutcome {
    let count = doc.operations().len();
    CheckOutcome::check(
        count > 0,
        format!("{count} operations"),
        "no path declares an HTTP operation",
    )
}

fn operation_ids(doc: &Document) -> CheckOutcome {
    let ops = doc.operations();
    let mut seen = HashSet::new();
    let mut failing = Vec::new();
    for op in &ops {
        match op.operation_id() {
            None => failing.push(format!("{} (missing)", op.label())),
            Some(id) if !seen.insert(id) => failing.push(format!("{} (duplicate {id})", op.label())),
            Some(_) => {}
        }
    }
    none_failing(failing, "operationIds are unique", "operationId problems")
}

fn component_schemas(doc: &Document) -> CheckOutcome {
    let count = doc.schemas().len();
    CheckOutcome::check(
        count > 0,
        format!("{count} component schemas"),
        "components.schemas is empty",
    )
}

fn collect_refs<'a>(node: &'a Value, out: &mut Vec<&'a str>) {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("$ref") {
                out.push(target);
            }
            for value in map.values() {
                collect_refs(value, out);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs(item, out)),
        _ => {}
    }
}

fn refs_resolve(doc: &Document) -> CheckOutcome {
    let mut refs = Vec::new();
    collect_refs(doc.root(), &mut refs);
    let mut broken: Vec<String> = refs
        .into_iter()
        .filter(|r| r.starts_with('#') && doc.resolve_ref(r).is_none())
        .map(str::to_string)
        .collect();
    broken.sort();
    broken.dedup();
    none_failing(broken, "all references resolve", "unresolvable references")
}

fn servers(doc: &Document) -> Vec<&Value> {
    doc.root()
        .get("servers")
        .and_then(Value::as_array)
        .map(|s| s.iter().collect())
        .unwrap_or_default()
}

fn servers_declared(doc: &Document) -> CheckOutcome {
    let count = doc.server_urls().len();
    CheckOutcome::check(count > 0, format!("{count} servers"), "no servers declared")
}

fn servers_https(doc: &Document) -> CheckOutcome {
    let insecure: Vec<String> = doc
        .server_urls()
        .into_iter()
        .filter(|url| !is_secure_url(url))
        .map(str::to_string)
        .collect();
    none_failing(insecure, "servers use HTTPS", "servers without TLS")
}

fn servers_versioned(doc: &Document) -> CheckOutcome {
    let urls = doc.server_urls();
    if urls.is_empty() {
        return CheckOutcome::fail("no servers declared");
    }
    let unversioned: Vec<String> = urls
        .into_iter()
        .filter(|url| !url.split('/').any(is_version_segment))
        .map(str::to_string)
        .collect();
    none_failing(unversioned, "server URLs are versioned", "server URLs without /vN")
}

fn servers_described(doc: &Document) -> CheckOutcome {
    let servers = servers(doc);
    if servers.is_empty() {
        return CheckOutcome::fail("no servers declared");
    }
    let undescribed: Vec<String> = servers
        .iter()
        .filter(|s| text_field(s, "description").is_none())
        .map(|s| s.get("url").and_then(Value::as_str).unwrap_or("?").to_string())
        .collect();
    none_failing(undescribed, "servers are described", "servers without description")
}

fn tags_declared(doc: &Document) -> CheckOutcome {
    let count = doc.declared_tags().len();
    CheckOutcome::check(count > 0, format!("{count} tags"), "no top-level tags")
}

fn tags_described(doc: &Document) -> CheckOutcome {
    let tags = doc
        .root()
        .get("tags")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if tags.is_empty() {
        return CheckOutcome::fail("no top-level tags");
    }
    let undescribed: Vec<String> = tags
        .iter()
        .filter(|t| text_field(t, "description").is_none())
        .map(|t| t.get("name").and_then(Value::as_str).unwrap_or("?").to_string())
        .collect();
    none_failing(undescribed, "tags are described", "tags without description")
}

fn operations_tagged(doc: &Document) -> CheckOutcome {
    every_operation(doc, |_| true, |op| !op.tags().is_empty(), "a tag")
}

fn operation_tags_declared(doc: &Document) -> CheckOutcome {
    let declared = doc.declared_tags();
    let mut undeclared: Vec<String> = doc
        .operations()
        .iter()
        .flat_map(|op| op.tags())
        .filter(|t| !declared.contains(t))
        .map(str::to_string)
        .collect();
    undeclared.sort();
    undeclared.dedup();
    none_failing(undeclared, "operation tags are declared", "undeclared tags")
}
