//! Prerequisite rules
//!
//! These never contribute points. The prerequisite gate runs a subset of
//! them (chosen by the active profile) and blocks grading when one fails.

use super::{join, operation_targets, operation_targets_where, with_operation};
use crate::api_id::ApiId;
use crate::document::Document;
use crate::models::{Category, Severity};
use crate::rules::base::{Effort, Rule, Target, ValidationResult};
use serde_json::Value;

pub const TENANT_HEADER: &str = "X-Organization-ID";
const REQUEST_ID_HEADERS: [&str; 2] = ["X-Request-ID", "X-Correlation-ID"];

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "PREREQ-OPENAPI",
            name: "OpenAPI version declared",
            description: "The document declares which OpenAPI version it follows",
            category: Category::Prerequisite,
            severity: Severity::Critical,
            points: 0.0,
            effort: Effort::Trivial,
            remediation: "Add `openapi: 3.1.0` (or another 3.x version) at the document root",
            detect: document_target,
            validate: validate_openapi_version,
        },
        Rule {
            id: "PREREQ-INFO-TITLE",
            name: "API title present",
            description: "info.title names the API",
            category: Category::Prerequisite,
            severity: Severity::Critical,
            points: 0.0,
            effort: Effort::Trivial,
            remediation: "Set info.title to the API's name",
            detect: document_target,
            validate: validate_info_title,
        },
        Rule {
            id: "PREREQ-INFO-VERSION",
            name: "API version present",
            description: "info.version identifies the published revision",
            category: Category::Prerequisite,
            severity: Severity::Critical,
            points: 0.0,
            effort: Effort::Trivial,
            remediation: "Set info.version, e.g. `1.0.0`",
            detect: document_target,
            validate: validate_info_version,
        },
        Rule {
            id: "PREREQ-PATHS",
            name: "Operations defined",
            description: "The document defines at least one path with at least one operation",
            category: Category::Prerequisite,
            severity: Severity::Critical,
            points: 0.0,
            effort: Effort::Large,
            remediation: "Describe at least one endpoint under `paths`",
            detect: document_target,
            validate: validate_paths,
        },
        Rule {
            id: "PREREQ-API-ID",
            name: "API tracking identifier present",
            description: "info.x-api-id carries the API's tracking identifier",
            category: Category::Prerequisite,
            severity: Severity::Critical,
            points: 0.0,
            effort: Effort::Trivial,
            remediation: "Add `x-api-id: <prefix>_<13-digit ms timestamp>_<16 hex>` under info",
            detect: document_target,
            validate: validate_api_id_present,
        },
        Rule {
            id: "PREREQ-API-ID-FORMAT",
            name: "API tracking identifier well-formed",
            description: "info.x-api-id matches <prefix>_<13 digits>_<16 hex>",
            category: Category::Prerequisite,
            severity: Severity::Critical,
            points: 0.0,
            effort: Effort::Trivial,
            remediation: "Use the form `acct_1699999999999_deadbeefcafebabe`: lowercase prefix, millisecond timestamp, 16 lowercase hex digits",
            detect: detect_api_id,
            validate: validate_api_id_format,
        },
        Rule {
            id: "PREREQ-001",
            name: "Authentication required",
            description: "Security schemes are defined and every operation requires authentication",
            category: Category::Prerequisite,
            severity: Severity::Critical,
            points: 0.0,
            effort: Effort::Medium,
            remediation: "Define a security scheme under components.securitySchemes and apply it globally via `security`",
            detect: detect_authentication,
            validate: validate_authentication,
        },
        Rule {
            id: "PREREQ-002",
            name: "HTTPS transport",
            description: "Every server is reached over HTTPS",
            category: Category::Prerequisite,
            severity: Severity::Critical,
            points: 0.0,
            effort: Effort::Small,
            remediation: "Declare servers with https:// URLs",
            detect: detect_servers,
            validate: validate_server_transport,
        },
        Rule {
            id: "PREREQ-003",
            name: "Tenant header on tenant-scoped operations",
            description: "Every non-admin operation accepts the X-Organization-ID header",
            category: Category::Prerequisite,
            severity: Severity::Critical,
            points: 0.0,
            effort: Effort::Small,
            remediation: "Declare a required `X-Organization-ID` header parameter (path-level parameters are inherited)",
            detect: detect_tenant_scoped,
            validate: validate_tenant_header,
        },
        Rule {
            id: "PREREQ-004",
            name: "Request correlation header",
            description: "Every operation accepts an X-Request-ID (or X-Correlation-ID) header",
            category: Category::Prerequisite,
            severity: Severity::Critical,
            points: 0.0,
            effort: Effort::Small,
            remediation: "Declare an `X-Request-ID` header parameter on each path item",
            detect: operation_targets,
            validate: validate_request_id,
        },
    ]
}

fn document_target(_doc: &Document) -> Vec<Target> {
    vec![Target::document()]
}

fn validate_openapi_version(_target: &Target, doc: &Document) -> ValidationResult {
    match doc.openapi_version() {
        Some(v) if v.starts_with("3.") => ValidationResult::pass(format!("OpenAPI {v}")),
        Some(v) => ValidationResult::fail(format!(
            "Unsupported specification version '{v}'; an OpenAPI 3.x document is required"
        )),
        None => ValidationResult::fail("Document does not declare an `openapi` version"),
    }
}

fn validate_info_title(_target: &Target, doc: &Document) -> ValidationResult {
    ValidationResult::check(
        doc.info_str("title").is_some(),
        "info.title is set",
        "info.title is missing or empty",
    )
}

fn validate_info_version(_target: &Target, doc: &Document) -> ValidationResult {
    ValidationResult::check(
        doc.info_str("version").is_some(),
        "info.version is set",
        "info.version is missing or empty",
    )
}

fn validate_paths(_target: &Target, doc: &Document) -> ValidationResult {
    let count = doc.operations().len();
    ValidationResult::check(
        count > 0,
        format!("{count} operations defined"),
        "Document defines no operations; at least one path with one HTTP method is required",
    )
}

fn api_id_value(doc: &Document) -> Option<&Value> {
    doc.info()?.get("x-api-id").filter(|v| !v.is_null())
}

fn validate_api_id_present(_target: &Target, doc: &Document) -> ValidationResult {
    ValidationResult::check(
        api_id_value(doc).is_some(),
        "info.x-api-id is present",
        "info.x-api-id tracking identifier is missing",
    )
}

/// Only a present identifier can be malformed
fn detect_api_id(doc: &Document) -> Vec<Target> {
    match api_id_value(doc) {
        Some(_) => vec![Target::node("info.x-api-id", &["info", "x-api-id"])],
        None => Vec::new(),
    }
}

fn validate_api_id_format(_target: &Target, doc: &Document) -> ValidationResult {
    let Some(value) = api_id_value(doc) else {
        return ValidationResult::fail("info.x-api-id tracking identifier is missing");
    };
    let Some(raw) = value.as_str() else {
        return ValidationResult::fail("info.x-api-id must be a string");
    };
    match ApiId::parse(raw) {
        Some(id) => {
            let issued = id
                .issued_at()
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "unknown date".to_string());
            ValidationResult::pass(format!("API id '{raw}' (prefix {}, issued {issued})", id.prefix))
        }
        None => ValidationResult::fail(format!(
            "info.x-api-id '{raw}' does not match <prefix>_<13-digit timestamp>_<16 hex>"
        )),
    }
}

fn detect_authentication(doc: &Document) -> Vec<Target> {
    let mut targets = vec![Target::node(
        "components.securitySchemes",
        &["components", "securitySchemes"],
    )];
    targets.extend(operation_targets(doc));
    targets
}

fn validate_authentication(target: &Target, doc: &Document) -> ValidationResult {
    if target.resolve_operation(doc).is_none() {
        let schemes = doc.security_schemes();
        return ValidationResult::check(
            !schemes.is_empty(),
            format!("{} security schemes defined", schemes.len()),
            "No security schemes are defined under components.securitySchemes",
        );
    }
    with_operation(target, doc, |op| {
        ValidationResult::check(
            op.requires_auth(doc),
            format!("{} requires authentication", target.label),
            format!("{} does not require authentication", target.label),
        )
    })
}

/// Servers, or the missing `servers` list itself
fn detect_servers(doc: &Document) -> Vec<Target> {
    let urls = doc.server_urls();
    if urls.is_empty() {
        return vec![Target::node("servers", &["servers"])];
    }
    urls.iter()
        .enumerate()
        .map(|(i, url)| Target::server(i, url))
        .collect()
}

fn validate_server_transport(target: &Target, doc: &Document) -> ValidationResult {
    let Some(url) = target
        .resolve_node(doc)
        .and_then(|server| server.get("url"))
        .and_then(Value::as_str)
    else {
        return ValidationResult::fail("No servers are declared; the API's transport is unspecified");
    };
    ValidationResult::check(
        is_secure_url(url),
        format!("{url} uses HTTPS"),
        format!("Server {url} does not use HTTPS"),
    )
}

/// HTTPS, relative to the document host, or loopback for local development
pub(crate) fn is_secure_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("wss://") || lower.starts_with('/') {
        return true;
    }
    ["http://localhost", "http://127.0.0.1", "http://[::1]"]
        .iter()
        .any(|local| lower.starts_with(local))
}

fn detect_tenant_scoped(doc: &Document) -> Vec<Target> {
    operation_targets_where(doc, |op| !op.is_admin())
}

fn validate_tenant_header(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        ValidationResult::check(
            op.has_parameter(doc, TENANT_HEADER, Some("header")),
            format!("{} accepts {TENANT_HEADER}", target.label),
            format!(
                "{} does not accept the {TENANT_HEADER} tenant header",
                target.label
            ),
        )
    })
}

fn validate_request_id(target: &Target, doc: &Document) -> ValidationResult {
    with_operation(target, doc, |op| {
        ValidationResult::check(
            op.has_any_header(doc, &REQUEST_ID_HEADERS),
            format!("{} accepts a request id header", target.label),
            format!(
                "{} does not accept any of {}",
                target.label,
                join(&REQUEST_ID_HEADERS)
            ),
        )
    })
}
