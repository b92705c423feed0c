//! Scalability rules: pagination, rate limiting, caching, async work

use super::{header_present, join, operation_targets, operation_targets_where, returns_list, with_operation};
use crate::document::Document;
use crate::models::{Category, Severity};
use crate::rules::base::{Effort, Rule, Target, TargetKind, ValidationResult};
use serde_json::Value;

/// Query parameters that bound or advance a page of results
pub(crate) const PAGINATION_PARAMS: [&str; 14] = [
    "limit",
    "page",
    "offset",
    "cursor",
    "page_size",
    "pageSize",
    "per_page",
    "perPage",
    "page_token",
    "pageToken",
    "after",
    "before",
    "starting_after",
    "max_results",
];

const CACHE_HEADERS: [&str; 4] = ["ETag", "Cache-Control", "Last-Modified", "Expires"];
const STATUS_HEADERS: [&str; 2] = ["Location", "Operation-Location"];

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "SCALE-001",
            name: "Paginated list endpoints",
            description: "GET operations that return lists accept pagination parameters",
            category: Category::Scalability,
            severity: Severity::Medium,
            points: 5.0,
            effort: Effort::Medium,
            remediation: "Accept `limit` plus a `cursor` (or `page`) query parameter on list endpoints",
            detect: detect_list_endpoints,
            validate: validate_pagination,
        },
        Rule {
            id: "SCALE-002",
            name: "Rate-limit headers",
            description: "Success responses expose rate-limit headers",
            category: Category::Scalability,
            severity: Severity::Low,
            points: 4.0,
            effort: Effort::Small,
            remediation: "Return X-RateLimit-Limit / X-RateLimit-Remaining (or RateLimit) headers",
            detect: operation_targets,
            validate: validate_rate_limit_headers,
        },
        Rule {
            id: "SCALE-003",
            name: "Throttling response",
            description: "Operations document 429 Too Many Requests",
            category: Category::Scalability,
            severity: Severity::Medium,
            points: 4.0,
            effort: Effort::Trivial,
            remediation: "Add a 429 response with a Retry-After header",
            detect: operation_targets,
            validate: validate_throttling_response,
        },
        Rule {
            id: "SCALE-004",
            name: "Cacheable reads",
            description: "Successful GET responses carry caching headers",
            category: Category::Scalability,
            severity: Severity::Low,
            points: 4.0,
            effort: Effort::Small,
            remediation: "Return ETag or Cache-Control on 200 responses of GET operations",
            detect: detect_cacheable_reads,
            validate: validate_cache_headers,
        },
        Rule {
            id: "SCALE-005",
            name: "Trackable async operations",
            description: "202 Accepted responses tell the client where to poll",
            category: Category::Scalability,
            severity: Severity::Medium,
            points: 3.0,
            effort: Effort::Small,
            remediation: "Return a Location (or Operation-Location) header pointing at a status resource",
            detect: detect_async_operations,
            validate: validate_async_location,
        },
        Rule {
            id: "SCALE-006",
            name: "Bounded arrays",
            description: "Array properties of component schemas declare maxItems",
            category: Category::Scalability,
            severity: Severity::Low,
            points: 3.0,
            effort: Effort::Trivial,
            remediation: "Set maxItems on array schemas so payload size stays bounded",
            detect: detect_array_schemas,
            validate: validate_bounded_arrays,
        },
    ]
}

fn detect_list_endpoints(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| op.method == "get" && returns_list(op, doc))
}

fn validate_pagination(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let params = op.effective_parameters(doc);
        let found = PAGINATION_PARAMS
            .iter()
            .any(|name| params.iter().any(|p| p.matches(name, Some("query"))));
        ValidationResult::check(
            found,
            format!("{} is paginated", target.label),
            format!("{} returns a list without pagination parameters", target.label),
        )
    })
}

fn has_rate_limit_header(doc: &Document, response: &Value) -> bool {
    doc.deref(response)
        .and_then(|r| r.get("headers"))
        .and_then(Value::as_object)
        .is_some_and(|headers| {
            headers.keys().any(|k| {
                let k = k.to_ascii_lowercase();
                k.starts_with("x-ratelimit") || k.starts_with("ratelimit")
            })
        })
}

fn validate_rate_limit_headers(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let found = op
            .responses_in_class(doc, '2')
            .iter()
            .any(|(_, response)| has_rate_limit_header(doc, response));
        ValidationResult::check(
            found,
            format!("{} exposes rate-limit headers", target.label),
            format!("{} success responses expose no rate-limit headers", target.label),
        )
    })
}

fn validate_throttling_response(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        ValidationResult::check(
            op.has_response(doc, "429"),
            format!("{} documents 429", target.label),
            format!("{} does not document 429 Too Many Requests", target.label),
        )
    })
}

fn detect_cacheable_reads(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| op.method == "get" && op.has_response(doc, "200"))
}

fn validate_cache_headers(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let cached = op
            .response(doc, "200")
            .is_some_and(|r| header_present(doc, r, &CACHE_HEADERS));
        ValidationResult::check(
            cached,
            format!("{} is cacheable", target.label),
            format!(
                "{} 200 response has none of {}",
                target.label,
                join(&CACHE_HEADERS)
            ),
        )
    })
}

fn detect_async_operations(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| op.has_response(doc, "202"))
}

fn validate_async_location(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let tracked = op
            .response(doc, "202")
            .is_some_and(|r| header_present(doc, r, &STATUS_HEADERS));
        ValidationResult::check(
            tracked,
            format!("{} returns a status location", target.label),
            format!("{} returns 202 without a Location header", target.label),
        )
    })
}

/// Inline arrays of a schema: itself and its direct properties
fn inline_arrays(schema: &Value) -> Vec<(String, &Value)> {
    let mut arrays = Vec::new();
    if schema.get("$ref").is_some() {
        return arrays;
    }
    if schema.get("type").and_then(Value::as_str) == Some("array") {
        arrays.push(("(root)".to_string(), schema));
    }
    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for (name, prop) in props {
            if prop.get("$ref").is_none()
                && prop.get("type").and_then(Value::as_str) == Some("array")
            {
                arrays.push((name.clone(), prop));
            }
        }
    }
    arrays.sort_by(|a, b| a.0.cmp(&b.0));
    arrays
}

fn detect_array_schemas(doc: &Document) -> Vec<Target> {
    doc.schemas()
        .iter()
        .filter(|(_, schema)| !inline_arrays(schema).is_empty())
        .map(|(name, _)| Target::schema(name))
        .collect()
}

fn validate_bounded_arrays(target: &Target, doc: &Document) -> ValidationResult {
    if !matches!(target.kind, TargetKind::Schema { .. }) {
        return ValidationResult::unresolved(target);
    }
    let Some(schema) = doc.resolve_ref(&target.location) else {
        return ValidationResult::unresolved(target);
    };
    let unbounded: Vec<String> = inline_arrays(schema)
        .into_iter()
        .filter(|(_, array)| array.get("maxItems").is_none())
        .map(|(name, _)| name)
        .collect();
    ValidationResult::check(
        unbounded.is_empty(),
        format!("{} arrays are bounded", target.label),
        format!("{} has arrays without maxItems: {}", target.label, join(&unbounded)),
    )
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

    fn list_response() -> Value {
        json!({"200": {"description": "ok", "content": {"application/json": {
            "schema": {"$ref": "#/components/schemas/UserPage"}
        }}}})
    }

    #[test]
    fn test_pagination_only_for_list_responses() {
        let doc = Document::new(json!({
            "components": {"schemas": {
                "UserPage": {"type": "object", "properties": {"data": {"type": "array", "maxItems": 100}}}
            }},
            "paths": {
                "/users": {"get": {
                    "parameters": [{"name": "limit", "in": "query"}],
                    "responses": list_response()
                }},
                "/teams": {"get": {"responses": list_response()}},
                "/health": {"get": {"responses": {"200": {"description": "ok"}}}}
            }
        }));
        assert_eq!(
            outcomes("SCALE-001", &doc),
            vec![("GET /teams".to_string(), false), ("GET /users".to_string(), true)]
        );
    }

    #[test]
    fn test_rate_limit_header_prefixes() {
        let doc = Document::new(json!({
            "paths": {
                "/a": {"get": {"responses": {"200": {"headers": {"x-ratelimit-remaining": {}}}}}},
                "/b": {"get": {"responses": {"200": {"headers": {"RateLimit": {}}}}}},
                "/c": {"get": {"responses": {"200": {"headers": {"ETag": {}}}}}}
            }
        }));
        let passed: Vec<bool> = outcomes("SCALE-002", &doc).into_iter().map(|(_, p)| p).collect();
        assert_eq!(passed, vec![true, true, false]);
    }

    #[test]
    fn test_async_location() {
        let doc = Document::new(json!({
            "paths": {
                "/exports": {"post": {"responses": {"202": {"headers": {"Location": {}}}}}},
                "/imports": {"post": {"responses": {"202": {"description": "queued"}}}},
                "/sync": {"post": {"responses": {"200": {}}}}
            }
        }));
        assert_eq!(
            outcomes("SCALE-005", &doc),
            vec![("POST /exports".to_string(), true), ("POST /imports".to_string(), false)]
        );
    }

    #[test]
    fn test_bounded_arrays() {
        let doc = Document::new(json!({
            "components": {"schemas": {
                "Alias": {"$ref": "#/components/schemas/Tags"},
                "Order": {"type": "object", "properties": {
                    "lines": {"type": "array", "maxItems": 50},
                    "notes": {"type": "array"},
                    "id": {"type": "string"}
                }},
                "Scalar": {"type": "string"},
                "Tags": {"type": "array", "maxItems": 20}
            }}
        }));
        assert_eq!(
            outcomes("SCALE-006", &doc),
            vec![
                ("schema Order".to_string(), false),
                ("schema Tags".to_string(), true),
            ]
        );
    }
}
