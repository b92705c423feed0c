//! Response envelopes, pagination, async operations, webhooks, documentation
//! and vendor extensions

use super::{every_operation, none_failing, text_field, CheckOutcome, Checkpoint, CheckpointCategory};
use crate::api_id::{is_valid_api_id, ApiId};
use crate::document::{ref_target, Document, Operation, HTTP_METHODS};
use crate::rules::{
    is_error_code, is_list_schema, is_success_code, primary_schema, returns_list,
    schema_properties, PAGINATION_PARAMS,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeSet;

const PAGE_SIZE_PARAMS: [&str; 6] = ["limit", "page_size", "pageSize", "per_page", "perPage", "max_results"];
const PAGE_LINK_FIELDS: [&str; 7] = ["next_cursor", "next", "next_page_token", "has_more", "pagination", "links", "total"];
const ASYNC_SEGMENTS: [&str; 3] = ["operations", "jobs", "status"];
const SIGNATURE_HEADERS: [&str; 3] = ["X-Signature", "X-Webhook-Signature", "Webhook-Signature"];

pub(super) fn checkpoints() -> Vec<Checkpoint> {
    use CheckpointCategory::{
        AsyncOperations, Documentation, Extensions, Pagination, ResponseEnvelope, Webhooks,
    };
    vec![
        Checkpoint::new("ENV-01", ResponseEnvelope, 2, "Error responses have a body schema", error_schemas),
        Checkpoint::new("ENV-02", ResponseEnvelope, 2, "One shared error schema", shared_error_schema),
        Checkpoint::new("ENV-03", ResponseEnvelope, 1, "Error schema carries code and message", error_fields),
        Checkpoint::new("ENV-04", ResponseEnvelope, 1, "Success bodies reference named schemas", success_refs),
        Checkpoint::new("ENV-05", ResponseEnvelope, 1, "GET bodies are objects, not bare arrays", no_bare_arrays),
        Checkpoint::new("PAG-01", Pagination, 2, "List operations are paginated", lists_paginated),
        Checkpoint::new("PAG-02", Pagination, 1, "List operations accept a page size", page_size),
        Checkpoint::new("PAG-03", Pagination, 1, "Page sizes are bounded", page_size_bounded),
        Checkpoint::new("PAG-04", Pagination, 1, "List envelopes link to the next page", page_links),
        Checkpoint::new("ASYNC-01", AsyncOperations, 2, "202 responses point at a status resource", accepted_location),
        Checkpoint::new("ASYNC-02", AsyncOperations, 1, "POST accepts Idempotency-Key", idempotency_key),
        Checkpoint::new("ASYNC-03", AsyncOperations, 1, "Async work exposes a status endpoint", status_endpoint),
        Checkpoint::new("ASYNC-04", AsyncOperations, 1, "202 responses describe the pending job", accepted_body),
        Checkpoint::new("HOOK-01", Webhooks, 1, "Webhooks declared", webhooks_declared),
        Checkpoint::new("HOOK-02", Webhooks, 1, "Webhook payloads have a schema", webhook_payloads),
        Checkpoint::new("HOOK-03", Webhooks, 1, "Webhooks are signed", webhook_signatures),
        Checkpoint::new("HOOK-04", Webhooks, 1, "Webhooks declare the expected acknowledgement", webhook_acks),
        Checkpoint::new("DOC-01", Documentation, 1, "Every operation has a summary", summaries),
        Checkpoint::new("DOC-02", Documentation, 1, "Every operation has a description", descriptions),
        Checkpoint::new("DOC-03", Documentation, 1, "Parameters are described", parameter_descriptions),
        Checkpoint::new("DOC-04", Documentation, 1, "Component schemas are described", schema_descriptions),
        Checkpoint::new("DOC-05", Documentation, 1, "Contact and license declared", contact_and_license),
        Checkpoint::new("DOC-06", Documentation, 1, "Success responses carry examples", success_examples),
        Checkpoint::new("EXT-01", Extensions, 2, "info.x-api-id is well formed", api_id_format).auto_fail(),
        Checkpoint::new("EXT-02", Extensions, 1, "Deprecated operations announce a sunset", sunset_dates),
        Checkpoint::new("EXT-03", Extensions, 1, "External documentation linked", external_docs),
        Checkpoint::new("EXT-04", Extensions, 1, "x-api-id was not issued in the future", api_id_issued),
    ]
}

/// Raw (unresolved) schema of the first JSON media type, falling back to any
fn raw_schema<'a>(doc: &'a Document, node: &'a Value) -> Option<&'a Value> {
    let content = doc.content(node)?;
    content
        .iter()
        .find(|(media, obj)| media.contains("json") && obj.get("schema").is_some())
        .or_else(|| content.iter().find(|(_, obj)| obj.get("schema").is_some()))
        .and_then(|(_, obj)| obj.get("schema"))
}

/// Error responses across all operations, labelled `METHOD /path code`
fn error_responses<'a>(doc: &'a Document) -> Vec<(String, &'a Value)> {
    doc.operations()
        .iter()
        .flat_map(|op| {
            op.responses(doc)
                .into_iter()
                .filter(|(code, _)| is_error_code(code))
                .map(|(code, r)| (format!("{} {code}", op.label()), r))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn error_schemas(doc: &Document) -> CheckOutcome {
    let responses = error_responses(doc);
    if responses.is_empty() {
        return CheckOutcome::fail("no error responses declared");
    }
    let bare: Vec<String> = responses
        .into_iter()
        .filter(|(_, r)| primary_schema(doc, r).is_none())
        .map(|(label, _)| label)
        .collect();
    none_failing(bare, "error responses have schemas", "error responses without schema")
}

fn shared_error_schema(doc: &Document) -> CheckOutcome {
    let responses = error_responses(doc);
    if responses.is_empty() {
        return CheckOutcome::fail("no error responses declared");
    }
    let mut targets = BTreeSet::new();
    let mut inline = Vec::new();
    for (label, response) in &responses {
        match raw_schema(doc, response).and_then(ref_target) {
            Some(target) => {
                targets.insert(target);
            }
            None => inline.push(label.clone()),
        }
    }
    if !inline.is_empty() {
        return none_failing(inline, "", "error responses with inline schemas");
    }
    match targets.len() {
        1 => CheckOutcome::pass(format!("all errors use {}", join(&targets))),
        n => CheckOutcome::fail(format!("{n} different error schemas: {}", join(&targets))),
    }
}

fn join(targets: &BTreeSet<&str>) -> String {
    targets.iter().copied().collect::<Vec<_>>().join(", ")
}

fn error_fields(doc: &Document) -> CheckOutcome {
    let schemas: Vec<&Value> = error_responses(doc)
        .into_iter()
        .filter_map(|(_, r)| primary_schema(doc, r))
        .collect();
    if schemas.is_empty() {
        return CheckOutcome::fail("no error schema to inspect");
    }
    let complete = schemas.iter().all(|schema| {
        schema_properties(doc, schema).is_some_and(|props| {
            (props.contains_key("code") && props.contains_key("message"))
                || (props.contains_key("title") && props.contains_key("status"))
        })
    });
    CheckOutcome::check(
        complete,
        "error schemas carry code and message",
        "error schemas lack code and message fields",
    )
}

fn success_refs(doc: &Document) -> CheckOutcome {
    let mut inline = Vec::new();
    for op in doc.operations() {
        for (code, response) in op.responses(doc) {
            if !is_success_code(code) {
                continue;
            }
            let Some(schema) = raw_schema(doc, response) else {
                continue;
            };
            let named = ref_target(schema).is_some()
                || schema.get("items").and_then(ref_target).is_some();
            if !named {
                inline.push(format!("{} {code}", op.label()));
            }
        }
    }
    none_failing(inline, "success bodies use named schemas", "inline success schemas")
}

fn no_bare_arrays(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| op.method == "get",
        |op| {
            op.responses_in_class(doc, '2').iter().all(|(_, r)| {
                primary_schema(doc, r)
                    .and_then(|s| s.get("type"))
                    .and_then(Value::as_str)
                    != Some("array")
            })
        },
        "an object response body",
    )
}

fn is_list_read(op: &Operation<'_>, doc: &Document) -> bool {
    op.method == "get" && (op.is_collection() || returns_list(op, doc))
}

fn accepts_any(op: &Operation<'_>, doc: &Document, names: &[&str]) -> bool {
    names.iter().any(|name| op.has_parameter(doc, name, Some("query")))
}

fn lists_paginated(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| is_list_read(op, doc),
        |op| accepts_any(op, doc, &PAGINATION_PARAMS),
        "pagination parameters",
    )
}

fn page_size(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| is_list_read(op, doc),
        |op| accepts_any(op, doc, &PAGE_SIZE_PARAMS),
        "a page size parameter",
    )
}

fn page_size_bounded(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| is_list_read(op, doc) && accepts_any(op, doc, &PAGE_SIZE_PARAMS),
        |op| {
            op.effective_parameters(doc)
                .iter()
                .filter(|p| PAGE_SIZE_PARAMS.iter().any(|n| p.matches(n, Some("query"))))
                .all(|p| {
                    p.resolved
                        .and_then(|param| param.get("schema"))
                        .and_then(|schema| doc.deref(schema))
                        .is_some_and(|schema| schema.get("maximum").is_some())
                })
        },
        "a maximum page size",
    )
}

fn page_links(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| is_list_read(op, doc),
        |op| {
            op.responses_in_class(doc, '2').iter().any(|(_, r)| {
                primary_schema(doc, r)
                    .filter(|schema| is_list_schema(doc, schema))
                    .and_then(|schema| schema_properties(doc, schema))
                    .is_some_and(|props| PAGE_LINK_FIELDS.iter().any(|f| props.contains_key(*f)))
            })
        },
        "a next-page link in the envelope",
    )
}

fn accepted_location(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| op.has_response(doc, "202"),
        |op| {
            op.response(doc, "202").is_some_and(|r| {
                doc.response_has_header(r, "Location")
                    || doc.response_has_header(r, "Operation-Location")
            })
        },
        "a Location header on 202",
    )
}

fn idempotency_key(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| op.method == "post",
        |op| op.has_parameter(doc, "Idempotency-Key", Some("header")),
        "an Idempotency-Key header",
    )
}

fn status_endpoint(doc: &Document) -> CheckOutcome {
    let ops = doc.operations();
    if !ops.iter().any(|op| op.has_response(doc, "202")) {
        return CheckOutcome::pass("no asynchronous operations");
    }
    let found = doc.paths().into_iter().find(|(path, _)| {
        path.split('/')
            .any(|segment| ASYNC_SEGMENTS.contains(&segment))
    });
    match found {
        Some((path, _)) => CheckOutcome::pass(format!("status resource {path}")),
        None => CheckOutcome::fail("202 responses but no operations, jobs or status resource"),
    }
}

fn accepted_body(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| op.has_response(doc, "202"),
        |op| {
            op.response(doc, "202")
                .and_then(|r| primary_schema(doc, r))
                .is_some()
        },
        "a 202 body schema",
    )
}

/// One webhook operation: `(label, method node, path item)`
fn webhook_operations(doc: &Document) -> Vec<(String, &Value, &Value)> {
    let root = doc.root();
    let Some(hooks) = root
        .get("webhooks")
        .or_else(|| root.get("x-webhooks"))
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };
    let mut ops = Vec::new();
    for (name, item) in hooks {
        let Some(item) = doc.deref(item) else {
            continue;
        };
        for method in HTTP_METHODS {
            if let Some(node) = item.get(method).filter(|n| n.is_object()) {
                ops.push((format!("{} {name}", method.to_uppercase()), node, item));
            }
        }
    }
    ops
}

fn every_webhook(
    doc: &Document,
    check: impl Fn(&Value, &Value) -> bool,
    what: &str,
) -> CheckOutcome {
    let hooks = webhook_operations(doc);
    if hooks.is_empty() {
        return CheckOutcome::fail("no webhooks declared");
    }
    let failing: Vec<String> = hooks
        .into_iter()
        .filter(|(_, node, item)| !check(*node, *item))
        .map(|(label, _, _)| label)
        .collect();
    none_failing(failing, &format!("webhooks have {what}"), &format!("webhooks without {what}"))
}

fn webhooks_declared(doc: &Document) -> CheckOutcome {
    let count = webhook_operations(doc).len();
    CheckOutcome::check(count > 0, format!("{count} webhooks"), "no webhooks declared")
}

fn webhook_payloads(doc: &Document) -> CheckOutcome {
    every_webhook(
        doc,
        |node, _| {
            node.get("requestBody")
                .and_then(|body| primary_schema(doc, body))
                .is_some()
        },
        "a payload schema",
    )
}

fn webhook_signatures(doc: &Document) -> CheckOutcome {
    every_webhook(
        doc,
        |node, item| {
            [node, item]
                .iter()
                .filter_map(|n| n.get("parameters").and_then(Value::as_array))
                .flatten()
                .filter_map(|p| doc.deref(p))
                .any(|p| {
                    p.get("in").and_then(Value::as_str) == Some("header")
                        && p.get("name").and_then(Value::as_str).is_some_and(|name| {
                            SIGNATURE_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
                        })
                })
        },
        "a signature header",
    )
}

fn webhook_acks(doc: &Document) -> CheckOutcome {
    every_webhook(
        doc,
        |node, _| {
            node.get("responses")
                .and_then(Value::as_object)
                .is_some_and(|responses| responses.keys().any(|code| is_success_code(code)))
        },
        "a 2xx acknowledgement",
    )
}

fn summaries(doc: &Document) -> CheckOutcome {
    every_operation(doc, |_| true, |op| text_field(op.node, "summary").is_some(), "a summary")
}

fn descriptions(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |_| true,
        |op| text_field(op.node, "description").is_some(),
        "a description",
    )
}

fn parameter_descriptions(doc: &Document) -> CheckOutcome {
    let mut undocumented: Vec<String> = doc
        .operations()
        .iter()
        .flat_map(|op| op.effective_parameters(doc))
        .filter(|p| p.description().is_none())
        .filter_map(|p| p.name().map(str::to_string))
        .collect();
    undocumented.sort();
    undocumented.dedup();
    none_failing(undocumented, "parameters are described", "parameters without description")
}

fn schema_descriptions(doc: &Document) -> CheckOutcome {
    let schemas = doc.schemas();
    if schemas.is_empty() {
        return CheckOutcome::fail("components.schemas is empty");
    }
    let undocumented: Vec<String> = schemas
        .into_iter()
        .filter(|(_, schema)| ref_target(schema).is_none() && text_field(schema, "description").is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    none_failing(undocumented, "schemas are described", "schemas without description")
}

fn contact_and_license(doc: &Document) -> CheckOutcome {
    let info = doc.info();
    let contact = info.and_then(|i| i.get("contact")).is_some_and(Value::is_object);
    let license = info
        .and_then(|i| i.get("license"))
        .is_some_and(|l| text_field(l, "name").is_some());
    match (contact, license) {
        (true, true) => CheckOutcome::pass("contact and license declared"),
        (false, true) => CheckOutcome::fail("info.contact missing"),
        (true, false) => CheckOutcome::fail("info.license missing"),
        (false, false) => CheckOutcome::fail("info.contact and info.license missing"),
    }
}

fn has_example(doc: &Document, response: &Value) -> bool {
    doc.content(response).is_some_and(|content| {
        content.values().any(|media| {
            media.get("example").is_some()
                || media
                    .get("examples")
                    .and_then(Value::as_object)
                    .is_some_and(|e| !e.is_empty())
                || media
                    .get("schema")
                    .and_then(|s| doc.deref(s))
                    .is_some_and(|s| s.get("example").is_some())
        })
    })
}

fn success_examples(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| {
            op.responses_in_class(doc, '2')
                .iter()
                .any(|(_, r)| doc.content(r).is_some())
        },
        |op| {
            op.responses_in_class(doc, '2')
                .iter()
                .filter(|(_, r)| doc.content(r).is_some())
                .all(|(_, r)| has_example(doc, r))
        },
        "response examples",
    )
}

fn api_id_format(doc: &Document) -> CheckOutcome {
    match doc.api_id() {
        Some(id) if is_valid_api_id(id) => CheckOutcome::pass(format!("api id {id}")),
        Some(id) => CheckOutcome::fail(format!(
            "x-api-id '{id}' does not match <prefix>_<13-digit timestamp>_<16 hex>"
        )),
        None => CheckOutcome::fail("info.x-api-id missing"),
    }
}

fn sunset_dates(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| op.is_deprecated(),
        |op| text_field(op.node, "x-sunset").is_some(),
        "an x-sunset date",
    )
}

fn external_docs(doc: &Document) -> CheckOutcome {
    let url = doc
        .root()
        .get("externalDocs")
        .and_then(|d| text_field(d, "url"));
    match url {
        Some(url) => CheckOutcome::pass(format!("external docs at {url}")),
        None => CheckOutcome::fail("externalDocs.url missing"),
    }
}

fn api_id_issued(doc: &Document) -> CheckOutcome {
    let Some(id) = doc.api_id().and_then(ApiId::parse) else {
        return CheckOutcome::fail("no well-formed x-api-id");
    };
    match id.issued_at() {
        Some(issued) if issued <= Utc::now() => {
            CheckOutcome::pass(format!("issued {}", issued.format("%Y-%m-%d")))
        }
        Some(issued) => CheckOutcome::fail(format!(
            "x-api-id issued in the future ({})",
            issued.format("%Y-%m-%d")
        )),
        None => CheckOutcome::fail("x-api-id timestamp is out of range"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shared_error_schema() {
        let doc = Document::new(json!({
            "components": {"schemas": {
                "Error": {"type": "object", "properties": {"code": {}, "message": {}}},
                "Other": {"type": "object"}
            }},
            "paths": {
                "/a": {"get": {"responses": {"404": {"content": {"application/json": {
                    "schema": {"$ref": "#/components/schemas/Error"}
                }}}}}},
                "/b": {"get": {"responses": {"400": {"content": {"application/json": {
                    "schema": {"$ref": "#/components/schemas/Other"}
                }}}}}}
            }
        }));
        let outcome = shared_error_schema(&doc);
        assert!(!outcome.passed);
        assert!(outcome.message.starts_with("2 different"));
        assert!(error_schemas(&doc).passed);
        assert!(!error_fields(&doc).passed);
    }

    #[test]
    fn test_pagination_bounds() {
        let doc = Document::new(json!({"paths": {"/orders": {"get": {"parameters": [
            {"name": "limit", "in": "query", "schema": {"type": "integer", "maximum": 100}},
            {"name": "cursor", "in": "query"}
        ]}}}}));
        assert!(lists_paginated(&doc).passed);
        assert!(page_size(&doc).passed);
        assert!(page_size_bounded(&doc).passed);

        let unbounded = Document::new(json!({"paths": {"/orders": {"get": {"parameters": [
            {"name": "limit", "in": "query", "schema": {"type": "integer"}}
        ]}}}}));
        assert!(!page_size_bounded(&unbounded).passed);
    }

    #[test]
    fn test_webhooks() {
        let doc = Document::new(json!({"x-webhooks": {"order.created": {"post": {
            "parameters": [{"name": "x-signature", "in": "header"}],
            "requestBody": {"content": {"application/json": {"schema": {"type": "object"}}}},
            "responses": {"204": {"description": "ack"}}
        }}}}));
        assert!(webhooks_declared(&doc).passed);
        assert!(webhook_payloads(&doc).passed);
        assert!(webhook_signatures(&doc).passed);
        assert!(webhook_acks(&doc).passed);
        assert!(!webhook_signatures(&Document::new(json!({}))).passed);
    }

    #[test]
    fn test_api_id_checkpoints() {
        let good = Document::new(json!({"info": {"x-api-id": "acct_1699999999999_deadbeefcafebabe"}}));
        assert!(api_id_format(&good).passed);
        assert!(api_id_issued(&good).passed);

        let future = Document::new(json!({"info": {"x-api-id": "acct_9999999999999_deadbeefcafebabe"}}));
        assert!(api_id_format(&future).passed);
        assert!(!api_id_issued(&future).passed);

        let bad = Document::new(json!({"info": {"x-api-id": "bad-id"}}));
        assert!(!api_id_format(&bad).passed);

        let padded = Document::new(json!({"info": {"x-api-id": " acct_1699999999999_deadbeefcafebabe "}}));
        assert!(!api_id_format(&padded).passed);

        let unicode_digits = Document::new(json!({"info": {"x-api-id":
            "acct_\u{661}\u{666}\u{669}\u{669}\u{669}\u{669}\u{669}\u{669}\u{669}\u{669}\u{669}\u{669}\u{669}_deadbeefcafebabe"}}));
        assert!(!api_id_format(&unicode_digits).passed);
        assert!(!api_id_issued(&unicode_digits).passed);
    }

    #[test]
    fn test_async_status_endpoint() {
        let doc = Document::new(json!({"paths": {"/exports": {"post": {"responses": {"202": {}}}}}}));
        assert!(!status_endpoint(&doc).passed);
        assert!(!accepted_location(&doc).passed);
        assert!(status_endpoint(&Document::new(json!({"paths": {}}))).passed);
    }
}
