//! Security and multi-tenancy

use super::{every_operation, none_failing, CheckOutcome, Checkpoint, CheckpointCategory};
use crate::document::{Document, EffectiveParameter};
use crate::rules::TENANT_HEADER;
use serde_json::Value;

const TOKEN_SCHEMES: [&str; 2] = ["oauth2", "openIdConnect"];

pub(super) fn checkpoints() -> Vec<Checkpoint> {
    use CheckpointCategory::{MultiTenancy, Security};
    vec![
        Checkpoint::new("SEC-01", Security, 3, "Security schemes defined", schemes_defined).auto_fail(),
        Checkpoint::new("SEC-02", Security, 2, "Global security requirement", global_requirement),
        Checkpoint::new("SEC-03", Security, 3, "Every operation requires authentication", operations_authenticated).auto_fail(),
        Checkpoint::new("SEC-04", Security, 2, "Token-based authentication scheme", token_scheme),
        Checkpoint::new("SEC-05", Security, 2, "No API keys in query strings", no_query_api_keys),
        Checkpoint::new("SEC-06", Security, 1, "Secured operations declare 401", unauthorized_declared),
        Checkpoint::new("TEN-01", MultiTenancy, 3, "Tenant header on non-admin operations", tenant_header_present).auto_fail(),
        Checkpoint::new("TEN-02", MultiTenancy, 2, "Tenant header is required", tenant_header_required),
        Checkpoint::new("TEN-03", MultiTenancy, 2, "Tenant header is a shared component", tenant_header_component),
        Checkpoint::new("TEN-04", MultiTenancy, 2, "Tenant-scoped operations declare 403", forbidden_declared),
        Checkpoint::new("TEN-05", MultiTenancy, 1, "Tenant header is documented", tenant_header_documented),
    ]
}

fn schemes_defined(doc: &Document) -> CheckOutcome {
    let schemes = doc.security_schemes();
    CheckOutcome::check(
        !schemes.is_empty(),
        format!("{} security schemes", schemes.len()),
        "components.securitySchemes is empty",
    )
}

fn global_requirement(doc: &Document) -> CheckOutcome {
    let declared = doc.global_security().is_some_and(|reqs| {
        reqs.iter()
            .any(|r| r.as_object().is_some_and(|m| !m.is_empty()))
    });
    CheckOutcome::check(
        declared,
        "global security requirement declared",
        "no global security requirement",
    )
}

fn operations_authenticated(doc: &Document) -> CheckOutcome {
    every_operation(doc, |_| true, |op| op.requires_auth(doc), "authentication")
}

fn scheme_type(scheme: &Value) -> Option<&str> {
    scheme.get("type").and_then(Value::as_str)
}

fn token_scheme(doc: &Document) -> CheckOutcome {
    let found = doc.security_schemes().into_iter().find(|(_, scheme)| {
        let kind = scheme_type(scheme);
        kind.is_some_and(|k| TOKEN_SCHEMES.contains(&k))
            || (kind == Some("http")
                && scheme
                    .get("scheme")
                    .and_then(Value::as_str)
                    .is_some_and(|s| s.eq_ignore_ascii_case("bearer")))
    });
    match found {
        Some((name, _)) => CheckOutcome::pass(format!("token scheme {name}")),
        None => CheckOutcome::fail("no bearer, OAuth2 or OpenID Connect scheme"),
    }
}

fn no_query_api_keys(doc: &Document) -> CheckOutcome {
    let in_query: Vec<String> = doc
        .security_schemes()
        .into_iter()
        .filter(|(_, scheme)| {
            scheme_type(scheme) == Some("apiKey")
                && scheme.get("in").and_then(Value::as_str) == Some("query")
        })
        .map(|(name, _)| name.to_string())
        .collect();
    none_failing(in_query, "no query-string API keys", "API keys passed in the query")
}

fn unauthorized_declared(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| op.requires_auth(doc),
        |op| op.has_response(doc, "401") || op.has_response(doc, "4XX"),
        "a 401 response",
    )
}

fn tenant_parameters<'a>(doc: &'a Document) -> Vec<EffectiveParameter<'a>> {
    doc.operations()
        .iter()
        .flat_map(|op| op.effective_parameters(doc))
        .filter(|p| p.matches(TENANT_HEADER, Some("header")))
        .collect()
}

fn tenant_header_present(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| !op.is_admin(),
        |op| op.has_parameter(doc, TENANT_HEADER, Some("header")),
        TENANT_HEADER,
    )
}

fn tenant_header_required(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| op.has_parameter(doc, TENANT_HEADER, Some("header")),
        |op| {
            op.effective_parameters(doc)
                .iter()
                .filter(|p| p.matches(TENANT_HEADER, Some("header")))
                .all(EffectiveParameter::is_required)
        },
        "a required tenant header",
    )
}

fn tenant_header_component(doc: &Document) -> CheckOutcome {
    let component = doc.components("parameters").into_iter().find(|(_, param)| {
        doc.deref(param).is_some_and(|p| {
            p.get("in").and_then(Value::as_str) == Some("header")
                && p.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|n| n.eq_ignore_ascii_case(TENANT_HEADER))
        })
    });
    match component {
        Some((name, _)) => CheckOutcome::pass(format!("#/components/parameters/{name}")),
        None => CheckOutcome::fail(format!("{TENANT_HEADER} is not declared under components.parameters")),
    }
}

fn forbidden_declared(doc: &Document) -> CheckOutcome {
    every_operation(
        doc,
        |op| !op.is_admin(),
        |op| op.has_response(doc, "403") || op.has_response(doc, "4XX"),
        "a 403 response",
    )
}

fn tenant_header_documented(doc: &Document) -> CheckOutcome {
    let params = tenant_parameters(doc);
    if params.is_empty() {
        return CheckOutcome::fail(format!("{TENANT_HEADER} is never declared"));
    }
    let documented = params
        .iter()
        .all(|p| p.description().is_some());
    CheckOutcome::check(
        documented,
        format!("{TENANT_HEADER} is documented"),
        format!("{TENANT_HEADER} has no description"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tenant_doc(required: bool) -> Document {
        Document::new(json!({
            "components": {"parameters": {"OrgId": {
                "name": "X-Organization-ID", "in": "header", "required": required,
                "description": "Tenant"
            }}},
            "paths": {
                "/orders": {
                    "parameters": [{"$ref": "#/components/parameters/OrgId"}],
                    "get": {"responses": {"403": {}}}
                },
                "/admin/tenants": {"get": {}}
            }
        }))
    }

    #[test]
    fn test_tenant_checkpoints() {
        let doc = tenant_doc(true);
        assert!(tenant_header_present(&doc).passed);
        assert!(tenant_header_required(&doc).passed);
        assert!(tenant_header_component(&doc).passed);
        assert!(forbidden_declared(&doc).passed);
        assert!(tenant_header_documented(&doc).passed);

        let optional = tenant_doc(false);
        assert!(!tenant_header_required(&optional).passed);
    }

    #[test]
    fn test_query_api_keys() {
        let doc = Document::new(json!({"components": {"securitySchemes": {
            "key": {"type": "apiKey", "in": "query", "name": "api_key"}
        }}}));
        let outcome = no_query_api_keys(&doc);
        assert!(!outcome.passed);
        assert!(outcome.message.contains("key"));
        assert!(!token_scheme(&doc).passed);
    }
}
