//! Functionality rules: operations are complete and callable

use super::{
    is_error_code, is_success_code, join, media_schemas, operation_targets,
    operation_targets_where, with_operation,
};
use crate::document::{Document, Operation};
use crate::models::{Category, Severity};
use crate::rules::base::{Effort, Rule, Target, ValidationResult};

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "FUNC-001",
            name: "Success response declared",
            description: "Every operation declares at least one 2xx response",
            category: Category::Functionality,
            severity: Severity::High,
            points: 5.0,
            effort: Effort::Small,
            remediation: "Document the success response (200, 201, 202 or 204)",
            detect: operation_targets,
            validate: validate_success_response,
        },
        Rule {
            id: "FUNC-002",
            name: "Unique operationId",
            description: "Every operation has an operationId that no other operation uses",
            category: Category::Functionality,
            severity: Severity::Medium,
            points: 4.0,
            effort: Effort::Trivial,
            remediation: "Give the operation a unique camelCase operationId, e.g. `listUsers`",
            detect: operation_targets,
            validate: validate_operation_id,
        },
        Rule {
            id: "FUNC-003",
            name: "Path parameters declared",
            description: "Every {template} in a path has a matching required path parameter",
            category: Category::Functionality,
            severity: Severity::High,
            points: 5.0,
            effort: Effort::Small,
            remediation: "Declare each path template variable as `in: path` with `required: true`",
            detect: detect_templated,
            validate: validate_path_parameters,
        },
        Rule {
            id: "FUNC-004",
            name: "Request body schema",
            description: "Request bodies declare content with a schema for every media type",
            category: Category::Functionality,
            severity: Severity::High,
            points: 4.0,
            effort: Effort::Small,
            remediation: "Add a schema (preferably a $ref to components.schemas) under requestBody.content",
            detect: detect_request_bodies,
            validate: validate_request_body,
        },
        Rule {
            id: "FUNC-005",
            name: "Success response schema",
            description: "Success responses that carry a body describe it with a schema",
            category: Category::Functionality,
            severity: Severity::Medium,
            points: 4.0,
            effort: Effort::Small,
            remediation: "Describe the response body under content.<media type>.schema",
            detect: detect_body_responses,
            validate: validate_response_schema,
        },
        Rule {
            id: "FUNC-006",
            name: "Create returns 201",
            description: "POST on a collection returns 201 Created (or 202 Accepted)",
            category: Category::Functionality,
            severity: Severity::Medium,
            points: 4.0,
            effort: Effort::Trivial,
            remediation: "Return 201 with the created resource (or 202 for asynchronous creation)",
            detect: detect_collection_posts,
            validate: validate_create_status,
        },
        Rule {
            id: "FUNC-007",
            name: "Error responses declared",
            description: "Every operation declares its 4xx/5xx responses or a default response",
            category: Category::Functionality,
            severity: Severity::Medium,
            points: 4.0,
            effort: Effort::Small,
            remediation: "Document the error responses (400, 404, 500 ...) the operation can return",
            detect: operation_targets,
            validate: validate_error_responses,
        },
    ]
}

fn validate_success_response(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        ValidationResult::check(
            !op.responses_in_class(doc, '2').is_empty(),
            format!("{} declares a success response", target.label),
            format!("{} declares no 2xx response", target.label),
        )
    })
}

fn validate_operation_id(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let Some(id) = op.operation_id() else {
            return ValidationResult::fail(format!("{} has no operationId", target.label));
        };
        let uses = doc
            .operations()
            .iter()
            .filter(|other| other.operation_id() == Some(id))
            .count();
        ValidationResult::check(
            uses == 1,
            format!("operationId '{id}' is unique"),
            format!("operationId '{id}' is used by {uses} operations"),
        )
    })
}

fn detect_templated(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| !op.path_template_names().is_empty())
}

fn validate_path_parameters(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let params = op.effective_parameters(doc);
        let missing: Vec<&str> = op
            .path_template_names()
            .into_iter()
            .filter(|name| {
                !params
                    .iter()
                    .any(|p| p.matches(name, Some("path")) && p.is_required())
            })
            .collect();
        ValidationResult::check(
            missing.is_empty(),
            format!("{} declares all path parameters", target.label),
            format!(
                "{} is missing required path parameters: {}",
                target.label,
                join(&missing)
            ),
        )
    })
}

fn detect_request_bodies(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| op.node.get("requestBody").is_some())
}

fn validate_request_body(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let Some(body) = op.request_body(doc) else {
            return ValidationResult::fail(format!(
                "{} has a request body reference that does not resolve",
                target.label
            ));
        };
        let media = media_schemas(doc, body);
        if media.is_empty() {
            return ValidationResult::fail(format!(
                "{} request body declares no content",
                target.label
            ));
        }
        let untyped: Vec<&str> = media
            .iter()
            .filter(|(_, schema)| schema.is_none())
            .map(|(m, _)| *m)
            .collect();
        ValidationResult::check(
            untyped.is_empty(),
            format!("{} request body is typed", target.label),
            format!(
                "{} request body has no schema for {}",
                target.label,
                join(&untyped)
            ),
        )
    })
}

/// Success codes that carry no body by definition
fn is_bodiless(code: &str) -> bool {
    matches!(code, "204" | "205")
}

fn body_responses<'a>(op: &Operation<'a>, doc: &'a Document) -> Vec<(&'a str, &'a serde_json::Value)> {
    if op.method == "head" {
        return Vec::new();
    }
    op.responses(doc)
        .into_iter()
        .filter(|(code, _)| is_success_code(code) && !is_bodiless(code))
        .collect()
}

fn detect_body_responses(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| !body_responses(op, doc).is_empty())
}

fn validate_response_schema(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let untyped: Vec<&str> = body_responses(&op, doc)
            .into_iter()
            .filter(|(_, response)| {
                let media = media_schemas(doc, response);
                media.is_empty() || media.iter().any(|(_, schema)| schema.is_none())
            })
            .map(|(code, _)| code)
            .collect();
        ValidationResult::check(
            untyped.is_empty(),
            format!("{} success responses are typed", target.label),
            format!(
                "{} has success responses without a body schema: {}",
                target.label,
                join(&untyped)
            ),
        )
    })
}

fn detect_collection_posts(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| {
        op.method == "post" && op.is_collection() && !op.path.contains(':')
    })
}

fn validate_create_status(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        ValidationResult::check(
            op.has_response(doc, "201") || op.has_response(doc, "202"),
            format!("{} returns 201/202", target.label),
            format!(
                "{} creates a resource but declares neither 201 nor 202",
                target.label
            ),
        )
    })
}

fn validate_error_responses(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        ValidationResult::check(
            op.responses(doc).iter().any(|(code, _)| is_error_code(code)),
            format!("{} declares error responses", target.label),
            format!("{} declares no 4xx/5xx or default response", target.label),
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
    fn test_duplicate_operation_ids() {
        let doc = Document::new(json!({
            "paths": {
                "/a": {"get": {"operationId": "list"}},
                "/b": {"get": {"operationId": "list"}, "post": {"operationId": "createB"}},
                "/c": {"get": {}}
            }
        }));
        assert_eq!(
            outcomes("FUNC-002", &doc),
            vec![
                ("GET /a".to_string(), false),
                ("GET /b".to_string(), false),
                ("POST /b".to_string(), true),
                ("GET /c".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_path_parameters_inherited_from_path_item() {
        let doc = Document::new(json!({
            "paths": {
                "/users/{id}": {
                    "parameters": [{"name": "id", "in": "path", "required": true}],
                    "get": {}
                },
                "/orders/{orderId}/lines/{lineId}": {
                    "get": {"parameters": [{"name": "orderId", "in": "path", "required": true}]}
                },
                "/plain": {"get": {}}
            }
        }));
        assert_eq!(
            outcomes("FUNC-003", &doc),
            vec![
                ("GET /orders/{orderId}/lines/{lineId}".to_string(), false),
                ("GET /users/{id}".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_response_schema_ignores_bodiless_responses() {
        let doc = Document::new(json!({
            "paths": {
                "/a": {
                    "delete": {"responses": {"204": {"description": "gone"}}},
                    "get": {"responses": {"200": {"description": "ok"}}},
                    "put": {"responses": {"200": {
                        "description": "ok",
                        "content": {"application/json": {"schema": {"type": "object"}}}
                    }}}
                }
            }
        }));
        assert_eq!(
            outcomes("FUNC-005", &doc),
            vec![("GET /a".to_string(), false), ("PUT /a".to_string(), true)]
        );
    }

    #[test]
    fn test_create_status_only_for_collections() {
        let doc = Document::new(json!({
            "paths": {
                "/users": {"post": {"responses": {"200": {"description": "ok"}}}},
                "/users/{id}": {"post": {"responses": {"200": {"description": "ok"}}}},
                "/users:batchGet": {"post": {"responses": {"200": {"description": "ok"}}}},
                "/jobs": {"post": {"responses": {"202": {"description": "queued"}}}}
            }
        }));
        assert_eq!(
            outcomes("FUNC-006", &doc),
            vec![("POST /jobs".to_string(), true), ("POST /users".to_string(), false)]
        );
    }

    #[test]
    fn test_error_responses_accept_default() {
        let doc = Document::new(json!({
            "paths": {
                "/a": {"get": {"responses": {"200": {}, "default": {}}}},
                "/b": {"get": {"responses": {"200": {}}}},
                "/c": {"get": {"responses": {"200": {}, "4XX": {}}}}
            }
        }));
        let passed: Vec<bool> = outcomes("FUNC-007", &doc).into_iter().map(|(_, p)| p).collect();
        assert_eq!(passed, vec![true, false, true]);
    }
}
