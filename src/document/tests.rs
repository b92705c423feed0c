use super::*;
use serde_json::json;

fn sample() -> Document {
    Document::new(json!({
        "openapi": "3.0.3",
        "info": {"title": "Accounts", "version": "1.0.0"},
        "paths": {
            "/users/{id}": {
                "parameters": [
                    {"$ref": "#/components/parameters/UserId"},
                    {"name": "X-Organization-ID", "in": "header", "required": true},
                    {"name": "verbose", "in": "query"}
                ],
                "get": {
                    "parameters": [
                        {"name": "verbose", "in": "query", "description": "override"},
                        {"name": "fields", "in": "query"}
                    ],
                    "responses": {"200": {"$ref": "#/components/responses/UserOk"}}
                },
                "delete": {
                    "parameters": [
                        {"name": "x-organization-id", "in": "header", "required": true}
                    ],
                    "responses": {"204": {"description": "gone"}}
                }
            },
            "/admin/stats": {"get": {"responses": {"200": {"description": "ok"}}}},
            "/users": {"$ref": "#/components/pathItems/Users"}
        },
        "components": {
            "parameters": {
                "UserId": {"name": "id", "in": "path", "required": true}
            },
            "responses": {
                "UserOk": {
                    "description": "ok",
                    "headers": {"ETag": {"schema": {"type": "string"}}}
                }
            },
            "pathItems": {
                "Users": {"post": {"responses": {"201": {"description": "created"}}}}
            }
        }
    }))
}

#[test]
fn test_resolve_ref() {
    let doc = sample();
    assert_eq!(
        doc.resolve_ref("#/components/parameters/UserId/name"),
        Some(&json!("id"))
    );
    assert_eq!(doc.resolve_ref("#/components/parameters/Missing"), None);
    assert_eq!(doc.resolve_ref("#/info/title/deeper"), None);
    assert_eq!(doc.resolve_ref("external.yaml#/Foo"), None);
    assert_eq!(doc.resolve_ref("#"), Some(doc.root()));
}

#[test]
fn test_deref_cycle_is_not_found() {
    let doc = Document::new(json!({
        "a": {"$ref": "#/b"},
        "b": {"$ref": "#/a"}
    }));
    assert_eq!(doc.deref(&json!({"$ref": "#/a"})), None);
}

#[test]
fn test_operations_are_ordered_and_follow_path_refs() {
    let doc = sample();
    let labels: Vec<String> = doc.operations().iter().map(|op| op.label()).collect();
    assert_eq!(
        labels,
        vec!["GET /admin/stats", "POST /users", "GET /users/{id}", "DELETE /users/{id}"]
    );
}

#[test]
fn test_effective_parameters_inherit_and_override() {
    let doc = sample();
    let op = doc.operation("/users/{id}", "get").expect("operation");
    let params = op.effective_parameters(&doc);
    let names: Vec<(&str, bool)> = params
        .iter()
        .map(|p| (p.name().unwrap_or("?"), p.inherited))
        .collect();
    // Inherited first (minus the overridden `verbose`), then operation-level in order
    assert_eq!(
        names,
        vec![
            ("id", true),
            ("X-Organization-ID", true),
            ("verbose", false),
            ("fields", false)
        ]
    );
    let verbose = params.iter().find(|p| p.name() == Some("verbose")).expect("verbose");
    assert_eq!(verbose.description(), Some("override"));
}

#[test]
fn test_header_override_is_case_insensitive() {
    let doc = sample();
    let op = doc.operation("/users/{id}", "delete").expect("operation");
    let headers: Vec<&str> = op
        .effective_parameters(&doc)
        .iter()
        .filter(|p| p.location() == Some("header"))
        .filter_map(|p| p.name())
        .collect();
    assert_eq!(headers, vec!["x-organization-id"]);
    assert!(op.has_parameter(&doc, "X-Organization-ID", Some("header")));
    assert!(op.has_parameter(&doc, "id", Some("path")));
    assert!(!op.has_parameter(&doc, "id", Some("query")));
}

#[test]
fn test_response_header_through_reference() {
    let doc = sample();
    let op = doc.operation("/users/{id}", "get").expect("operation");
    let ok = op.response(&doc, "200").expect("200 response");
    assert!(doc.response_has_header(ok, "etag"));
    assert!(!doc.response_has_header(ok, "Cache-Control"));
    assert!(op.has_response(&doc, "200"));
    assert!(!op.has_response(&doc, "404"));
}

#[test]
fn test_admin_and_collection_detection() {
    let doc = sample();
    let admin = doc.operation("/admin/stats", "get").expect("admin op");
    assert!(admin.is_admin());
    assert!(admin.is_collection());
    let item = doc.operation("/users/{id}", "get").expect("item op");
    assert!(!item.is_admin());
    assert!(!item.is_collection());
    assert_eq!(item.path_template_names(), vec!["id"]);
    assert_eq!(item.location(), "#/paths/~1users~1{id}/get");
}

#[test]
fn test_info_accessors() {
    let doc = sample();
    assert_eq!(doc.openapi_version(), Some("3.0.3"));
    assert_eq!(doc.info_str("title"), Some("Accounts"));
    assert_eq!(doc.info_str("description"), None);
    assert!(is_version_segment("v2"));
    assert!(!is_version_segment("vendors"));
}
