//! Security rules: authentication, transport, credential handling

use super::{is_secure_url, join, operation_targets, operation_targets_where, with_operation};
use crate::document::Document;
use crate::models::{Category, Severity};
use crate::rules::base::{Effort, Rule, Target, TargetKind, ValidationResult};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

static SENSITIVE_PARAM: OnceLock<Regex> = OnceLock::new();

fn sensitive_param() -> &'static Regex {
    SENSITIVE_PARAM.get_or_init(|| {
        Regex::new(r"(?i)^(password|passwd|pwd|secret|client_secret|token|access_token|refresh_token|api[_-]?key|access[_-]?key|private[_-]?key|ssn|credit[_-]?card|card[_-]?number)$")
            .expect("sensitive parameter pattern is valid")
    })
}

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "SEC-001",
            name: "Security schemes defined",
            description: "The document defines at least one security scheme",
            category: Category::Security,
            severity: Severity::Critical,
            points: 6.0,
            effort: Effort::Medium,
            remediation: "Define an OAuth2, OpenID Connect or bearer scheme under components.securitySchemes",
            detect: document_target,
            validate: validate_schemes_defined,
        },
        Rule {
            id: "SEC-002",
            name: "Operations protected",
            description: "Every operation requires a declared security scheme",
            category: Category::Security,
            severity: Severity::High,
            points: 6.0,
            effort: Effort::Small,
            remediation: "Apply a security requirement globally or on the operation, referencing a declared scheme",
            detect: operation_targets,
            validate: validate_operation_protected,
        },
        Rule {
            id: "SEC-003",
            name: "HTTPS servers",
            description: "Servers are only reachable over HTTPS",
            category: Category::Security,
            severity: Severity::High,
            points: 4.0,
            effort: Effort::Small,
            remediation: "Replace http:// server URLs with https://",
            detect: detect_servers,
            validate: validate_server_https,
        },
        Rule {
            id: "SEC-004",
            name: "Credentials outside the URL",
            description: "API keys are not sent in the query string and HTTP basic auth is avoided",
            category: Category::Security,
            severity: Severity::High,
            points: 3.0,
            effort: Effort::Medium,
            remediation: "Send API keys in a header and prefer bearer tokens over basic auth",
            detect: detect_schemes,
            validate: validate_credential_placement,
        },
        Rule {
            id: "SEC-005",
            name: "Auth failure responses",
            description: "Protected operations document 401 and 403 responses",
            category: Category::Security,
            severity: Severity::Medium,
            points: 3.0,
            effort: Effort::Trivial,
            remediation: "Add 401 Unauthorized and 403 Forbidden responses (shared via components.responses)",
            detect: detect_protected,
            validate: validate_auth_responses,
        },
        Rule {
            id: "SEC-006",
            name: "No secrets in query parameters",
            description: "Passwords, tokens and keys are never accepted as query parameters",
            category: Category::Security,
            severity: Severity::High,
            points: 3.0,
            effort: Effort::Medium,
            remediation: "Move secrets into headers or the request body",
            detect: detect_query_parameters,
            validate: validate_query_parameters,
        },
    ]
}

fn document_target(_doc: &Document) -> Vec<Target> {
    vec![Target::document()]
}

fn validate_schemes_defined(_target: &Target, doc: &Document) -> ValidationResult {
    let schemes = doc.security_schemes();
    ValidationResult::check(
        !schemes.is_empty(),
        format!("{} security schemes defined", schemes.len()),
        "No security schemes are defined",
    )
}

fn validate_operation_protected(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        if !op.requires_auth(doc) {
            return ValidationResult::fail(format!(
                "{} does not require authentication",
                target.label
            ));
        }
        let declared: Vec<&str> = doc.security_schemes().iter().map(|(n, _)| *n).collect();
        let mut undeclared: Vec<&str> = op
            .effective_security(doc)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .flat_map(|req| req.keys().map(String::as_str))
            .filter(|name| !declared.contains(name))
            .collect();
        undeclared.sort_unstable();
        undeclared.dedup();
        ValidationResult::check(
            undeclared.is_empty(),
            format!("{} is protected", target.label),
            format!(
                "{} references undeclared security schemes: {}",
                target.label,
                join(&undeclared)
            ),
        )
    })
}

fn detect_servers(doc: &Document) -> Vec<Target> {
    doc.server_urls()
        .iter()
        .enumerate()
        .map(|(i, url)| Target::server(i, url))
        .collect()
}

fn validate_server_https(target: &Target, doc: &Document) -> ValidationResult {
    let url = target
        .resolve_node(doc)
        .and_then(|s| s.get("url"))
        .and_then(Value::as_str);
    match url {
        Some(url) => ValidationResult::check(
            is_secure_url(url),
            format!("{url} uses HTTPS"),
            format!("Server {url} is reachable over plain HTTP"),
        ),
        None => ValidationResult::unresolved(target),
    }
}

fn detect_schemes(doc: &Document) -> Vec<Target> {
    doc.security_schemes()
        .iter()
        .map(|(name, _)| Target::security_scheme(name))
        .collect()
}

fn validate_credential_placement(target: &Target, doc: &Document) -> ValidationResult {
    let name = match &target.kind {
        TargetKind::SecurityScheme { name } => name.as_str(),
        _ => return ValidationResult::unresolved(target),
    };
    let Some(scheme) = target.resolve_node(doc) else {
        return ValidationResult::unresolved(target);
    };
    let kind = scheme.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "apiKey" if scheme.get("in").and_then(Value::as_str) == Some("query") => {
            ValidationResult::fail(format!(
                "Security scheme '{name}' sends its API key in the query string"
            ))
            .with_hint("Use `in: header` so keys do not end up in logs and browser history")
        }
        "http"
            if scheme
                .get("scheme")
                .and_then(Value::as_str)
                .is_some_and(|s| s.eq_ignore_ascii_case("basic")) =>
        {
            ValidationResult::fail(format!(
                "Security scheme '{name}' uses HTTP basic authentication"
            ))
        }
        _ => ValidationResult::pass(format!("Security scheme '{name}' keeps credentials out of the URL")),
    }
}

fn detect_protected(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| op.requires_auth(doc))
}

fn validate_auth_responses(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let range = op.has_response(doc, "4XX") || op.has_response(doc, "4xx");
        let missing: Vec<&str> = ["401", "403"]
            .into_iter()
            .filter(|code| !range && !op.has_response(doc, code))
            .collect();
        ValidationResult::check(
            missing.is_empty(),
            format!("{} documents auth failures", target.label),
            format!("{} is protected but does not declare {}", target.label, join(&missing)),
        )
    })
}

fn detect_query_parameters(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| {
        op.effective_parameters(doc)
            .iter()
            .any(|p| p.location() == Some("query"))
    })
}

fn validate_query_parameters(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        let sensitive: Vec<&str> = op
            .effective_parameters(doc)
            .iter()
            .filter(|p| p.location() == Some("query"))
            .filter_map(|p| p.name())
            .filter(|name| sensitive_param().is_match(name))
            .collect();
        ValidationResult::check(
            sensitive.is_empty(),
            format!("{} query parameters carry no secrets", target.label),
            format!(
                "{} accepts sensitive values in the query string: {}",
                target.label,
                join(&sensitive)
            ),
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
    fn test_undeclared_scheme_reference_fails() {
        let doc = Document::new(json!({
            "components": {"securitySchemes": {"oauth": {"type": "oauth2"}}},
            "security": [{"oauth": []}],
            "paths": {
                "/a": {"get": {}},
                "/b": {"get": {"security": [{"legacyKey": []}]}},
                "/c": {"get": {"security": []}}
            }
        }));
        assert_eq!(
            outcomes("SEC-002", &doc),
            vec![
                ("GET /a".to_string(), true),
                ("GET /b".to_string(), false),
                ("GET /c".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_credential_placement() {
        let doc = Document::new(json!({
            "components": {"securitySchemes": {
                "basic": {"type": "http", "scheme": "Basic"},
                "bearer": {"type": "http", "scheme": "bearer"},
                "headerKey": {"type": "apiKey", "in": "header", "name": "X-API-Key"},
                "queryKey": {"type": "apiKey", "in": "query", "name": "api_key"}
            }}
        }));
        let passed: Vec<bool> = outcomes("SEC-004", &doc).into_iter().map(|(_, p)| p).collect();
        assert_eq!(passed, vec![false, true, true, false]);
    }

    #[test]
    fn test_auth_responses_accept_range() {
        let doc = Document::new(json!({
            "security": [{"oauth": []}],
            "paths": {
                "/a": {"get": {"responses": {"401": {}, "403": {}}}},
                "/b": {"get": {"responses": {"401": {}}}},
                "/c": {"get": {"responses": {"4XX": {}}}},
                "/public": {"get": {"security": [], "responses": {}}}
            }
        }));
        assert_eq!(
            outcomes("SEC-005", &doc),
            vec![
                ("GET /a".to_string(), true),
                ("GET /b".to_string(), false),
                ("GET /c".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_sensitive_query_parameters() {
        let doc = Document::new(json!({
            "paths": {
                "/login": {"get": {"parameters": [
                    {"name": "user", "in": "query"},
                    {"name": "Password", "in": "query"}
                ]}},
                "/search": {"get": {"parameters": [
                    {"name": "q", "in": "query"},
                    {"name": "api_key", "in": "header"}
                ]}}
            }
        }));
        assert_eq!(
            outcomes("SEC-006", &doc),
            vec![("GET /login".to_string(), false), ("GET /search".to_string(), true)]
        );
    }
}
