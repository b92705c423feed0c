//! HTTP semantics, rate limiting, caching and content negotiation

use super::{every_operation, none_failing, CheckOutcome, Checkpoint, CheckpointCategory};
use crate::document::{Document, Operation};
use crate::rules::header_present;
use serde_json::Value;

const JSON_MEDIA_TYPES: [&str; 2] = ["application/json", "application/problem+json"];

pub(super) fn checkpoints() -> Vec<Checkpoint> {
    use CheckpointCategory::{Caching, ContentNegotiation, HttpSemantics, RateLimiting};
    vec![
        Checkpoint::new("HTTP-01", HttpSemantics, 2, "Every operation declares a success response", success_declared),
        Checkpoint::new("HTTP-02", HttpSemantics, 2, "Collection POST returns 201 or 202", create_status),
        Checkpoint::new("HTTP-03", HttpSemantics, 2, "DELETE returns 200, 202 or 204", delete_status),
        Checkpoint::new("HTTP-04", HttpSemantics, 1, "GET carries no request body", get_without_body),
        Checkpoint::new("HTTP-05", HttpSemantics, 2, "Every operation declares a client error", client_error_declared),
        Checkpoint::new("HTTP-06", HttpSemantics, 1, "Every operation declares a server error", server_error_declared),
        Checkpoint::new("HTTP-07", HttpSemantics, 1, "PUT and PATCH address a single item", updates_target_items),
        Checkpoint::new("RL-01", RateLimiting, 2, "Every operation declares 429", too_many_requests),
        Checkpoint::new("RL-02", RateLimiting, 1, "429 responses carry Retry-After", retry_after),
        Checkpoint::new("RL-03", RateLimiting, 1, "Success responses carry a rate limit", rate_limit_limit),
        Checkpoint::new("RL-04", RateLimiting, 1, "Success responses carry remaining quota", rate_limit_remaining),
        Checkpoint::new("CACHE-01", Caching, 1, "GET 200 responses carry ETag", etag),
        Checkpoint::new("CACHE-02", Caching, 1, "GET 200 responses carry Cache-Control", cache_control),
        Checkpoint::new("CACHE-03", Caching, 1, "Updates accept If-Match", conditional_updates),
        Checkpoint::new("CACHE-04", Caching, 1, "Item reads support conditional requests", conditional_reads),
        Checkpoint::new("CN-01", ContentNegotiation, 1, "Responses are JSON", json_responses),
        Checkpoint::new("CN-02", ContentNegotiation, 1, "Request bodies accept JSON", json_requests),
        Checkpoint::new("CN-03", ContentNegotiation, 1, "Every media type has a schema", media_types_have_schemas),
        Checkpoint::new("CN-04", ContentNegotiation, 1, "No wildcard media types", no_wildcard_media),
    ]
}

fn success_declared(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |_| true,
        |op| !op.responses_in_class(doc, '2').is_empty(),
        "a 2xx response",
    )
}

fn is_collection_post(op: &Operation<'_>) -> bool {
    op.method == "post" && op.is_collection() && !op.path.contains(':')
}

fn create_status(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        is_collection_post,
        |op| op.has_response(doc, "201") || op.has_response(doc, "202"),
        "a 201 or 202 response",
    )
}

fn delete_status(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| op.method == "delete",
        |op| ["200", "202", "204"].iter().any(|c| op.has_response(doc, c)),
        "a 200, 202 or 204 response",
    )
}

fn get_without_body(doc: &Document) -> CheckOutcome {
    let offenders: Vec<String> = doc
        .operations()
        .iter()
        .filter(|op| op.method == "get" && op.node.get("requestBody").is_some())
        .map(|op| op.label())
        .collect();
    none_failing(offenders, "no GET request bodies", "GET operations with a request body")
}

fn client_error_declared(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |_| true,
        |op| !op.responses_in_class(doc, '4').is_empty(),
        "a 4xx response",
    )
}

fn server_error_declared(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |_| true,
        |op| !op.responses_in_class(doc, '5').is_empty() || op.has_response(doc, "default"),
        "a 5xx or default response",
    )
}

fn updates_target_items(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| matches!(op.method, "put" | "patch"),
        |op| !op.path_template_names().is_empty(),
        "an item identifier in the path",
    )
}

fn too_many_requests(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |_| true,
        |op| op.has_response(doc, "429") || op.has_response(doc, "4XX"),
        "a 429 response",
    )
}

fn retry_after(doc: &Document) -> CheckOutcome {
    let responses: Vec<(String, &Value)> = doc
        .operations()
        .iter()
        .filter_map(|op| op.response(doc, "429").map(|r| (op.label(), r)))
        .collect();
    if responses.is_empty() {
        return CheckOutcome::fail("no 429 responses declared");
    }
    let missing: Vec<String> = responses
        .into_iter()
        .filter(|(_, r)| !doc.response_has_header(r, "Retry-After"))
        .map(|(label, _)| label)
        .collect();
    none_failing(missing, "429 responses carry Retry-After", "429 without Retry-After")
}

fn success_headers(doc: &Document, names: &[&str], what: &str) -> CheckOutcome {
    every_operation(
        doc,
        |_| true,
        |op| {
            op.responses_in_class(doc, '2')
                .iter()
                .any(|(_, r)| header_present(doc, r, names))
        },
        what,
    )
}

fn rate_limit_limit(doc: &Document) -> CheckOutcome {
    success_headers(doc, &["X-RateLimit-Limit", "RateLimit-Limit"], "a rate limit header")
}

fn rate_limit_remaining(doc: &Document) -> CheckOutcome {
    success_headers(
        doc,
        &["X-RateLimit-Remaining", "RateLimit-Remaining"],
        "a remaining quota header",
    )
}

fn get_ok_header(doc: &Document, header: &str, what: &str) -> CheckOutcome {
    every_operation(
        doc,
        |op| op.method == "get" && op.has_response(doc, "200"),
        |op| {
            op.response(doc, "200")
                .is_some_and(|r| doc.response_has_header(r, header))
        },
        what,
    )
}

fn etag(doc: &Document) -> CheckOutcome {
    get_ok_header(doc, "ETag", "an ETag header")
}

fn cache_control(doc: &Document) -> CheckOutcome {
    get_ok_header(doc, "Cache-Control", "a Cache-Control header")
}

fn conditional_updates(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| matches!(op.method, "put" | "patch"),
        |op| op.has_parameter(doc, "If-Match", Some("header")),
        "an If-Match header",
    )
}

fn conditional_reads(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| op.method == "get" && !op.is_collection(),
        |op| op.has_parameter(doc, "If-None-Match", Some("header")) || op.has_response(doc, "304"),
        "If-None-Match or a 304 response",
    )
}

/// Every media type declared on responses (or request bodies), with its owner
fn media_types<'a>(doc: &'a Document, requests: bool) -> Vec<(String, &'a str, &'a Value)> {
    let mut found = Vec::new();
    for op in doc.operations() {
        let nodes: Vec<&Value> = if requests {
            op.request_body(doc).into_iter().collect()
        } else {
            op.responses(doc).into_iter().map(|(_, r)| r).collect()
        };
        for node in nodes {
            if let Some(content) = doc.content(node) {
                for (media, object) in content {
                    found.push((op.label(), media.as_str(), object));
                }
            }
        }
    }
    found
}

fn is_json(media: &str) -> bool {
    let media = media.split(';').next().unwrap_or(media).trim();
    JSON_MEDIA_TYPES.contains(&media) || media.ends_with("+json")
}

fn json_responses(doc: &Document) -> CheckOutcome {
    let offenders: Vec<String> = media_types(doc, false)
        .into_iter()
        .filter(|(_, media, _)| !is_json(media))
        .map(|(label, media, _)| format!("{label} ({media})"))
        .collect();
    none_failing(offenders, "responses are JSON", "non-JSON responses")
}

fn json_requests(doc: &Document) -> CheckOutcome {
    let mut offenders = Vec::new();
    for op in doc.operations() {
        let Some(body) = op.request_body(doc) else {
            continue;
        };
        let accepts_json = doc
            .content(body)
            .is_some_and(|content| content.keys().any(|m| is_json(m)));
        if !accepts_json {
            offenders.push(op.label());
        }
    }
    none_failing(offenders, "request bodies accept JSON", "request bodies without JSON")
}

fn media_types_have_schemas(doc: &Document) -> CheckOutcome {
    let mut all = media_types(doc, false);
    all.extend(media_types(doc, true));
    let offenders: Vec<String> = all
        .into_iter()
        .filter(|(_, _, object)| object.get("schema").is_none())
        .map(|(label, media, _)| format!("{label} ({media})"))
        .collect();
    none_failing(offenders, "every media type has a schema", "media types without schema")
}

fn no_wildcard_media(doc: &Document) -> CheckOutcome {
    let mut all = media_types(doc, false);
    all.extend(media_types(doc, true));
    let offenders: Vec<String> = all
        .into_iter()
        .filter(|(_, media, _)| media.contains('*'))
        .map(|(label, media, _)| format!("{label} ({media})"))
        .collect();
    none_failing(offenders, "no wildcard media types", "wildcard media types")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_http_semantics() {
        let doc = Document::new(json!({"paths": {
            "/orders": {"post": {"responses": {"200": {}}}, "get": {"requestBody": {}}},
            "/orders/{id}": {"delete": {"responses": {"204": {}}}},
            "/orders/batch": {"put": {}}
        }}));
        assert!(!create_status(&doc).passed);
        assert!(delete_status(&doc).passed);
        assert!(!get_without_body(&doc).passed);
        assert!(!updates_target_items(&doc).passed);
    }

    #[test]
    fn test_retry_after() {
        let doc = Document::new(json!({"paths": {"/a": {"get": {"responses": {
            "429": {"description": "slow down", "headers": {"retry-after": {}}}
        }}}}}));
        assert!(retry_after(&doc).passed);
        assert!(!retry_after(&Document::new(json!({"paths": {}}))).passed);
    }

    #[test]
    fn test_media_types() {
        let doc = Document::new(json!({"paths": {"/a": {"get": {"responses": {"200": {"content": {
            "application/json; charset=utf-8": {"schema": {}},
            "text/csv": {},
            "*/*": {"schema": {}}
        }}}}}}}));
        let outcome = json_responses(&doc);
        assert!(!outcome.passed);
        assert!(outcome.message.contains("text/csv"));
        assert!(!outcome.message.contains("charset"));
        assert!(!media_types_have_schemas(&doc).passed);
        assert!(!no_wildcard_media(&doc).passed);
    }
}
