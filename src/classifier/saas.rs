//! Multi-tenant SaaS platform patterns

use super::{Evidence, PatternDetector};
use crate::document::{template_names, Document, Operation};
use serde_json::Value;

const TENANT_HEADERS: [&str; 2] = ["X-Organization-ID", "X-Tenant-ID"];
const TENANT_SEGMENTS: [&str; 4] = ["organizations", "tenants", "workspaces", "accounts"];
const TENANT_TEMPLATES: [&str; 4] = ["orgId", "organizationId", "tenantId", "workspaceId"];

/// Share of non-admin operations that must require a tenant header; strictly more fires
const TENANT_HEADER_MAJORITY: f64 = 0.5;

pub(super) fn detectors() -> Vec<PatternDetector> {
    vec![
        PatternDetector {
            id: "saas-tenant-header",
            description: "Most non-admin operations require a tenant header",
            weight: 4.0,
            detect: tenant_header,
        },
        PatternDetector {
            id: "saas-tenant-paths",
            description: "Resources are scoped under a tenant path",
            weight: 3.0,
            detect: tenant_paths,
        },
        PatternDetector {
            id: "saas-oauth2-scopes",
            description: "OAuth2 flows declare scopes",
            weight: 2.0,
            detect: oauth2_scopes,
        },
        PatternDetector {
            id: "saas-api-id",
            description: "The API carries a registry identifier",
            weight: 2.0,
            detect: api_id,
        },
        PatternDetector {
            id: "saas-rate-limits",
            description: "Responses advertise rate limits",
            weight: 1.0,
            detect: rate_limit_headers,
        },
        PatternDetector {
            id: "saas-admin-operations",
            description: "Administrative operations are separated",
            weight: 1.0,
            detect: admin_operations,
        },
        PatternDetector {
            id: "saas-webhooks",
            description: "Webhooks are declared",
            weight: 1.0,
            detect: webhooks,
        },
    ]
}

fn requires_tenant_header<'a>(doc: &'a Document, op: &Operation<'a>) -> bool {
    op.effective_parameters(doc).iter().any(|p| {
        p.is_required()
            && TENANT_HEADERS
                .iter()
                .any(|header| p.matches(header, Some("header")))
    })
}

fn tenant_header(doc: &Document) -> Evidence {
    let operations: Vec<Operation<'_>> = doc
        .operations()
        .into_iter()
        .filter(|op| !op.is_admin())
        .collect();
    if operations.is_empty() {
        return Evidence::none();
    }
    let scoped: Vec<String> = operations
        .iter()
        .filter(|op| requires_tenant_header(doc, op))
        .map(|op| op.label())
        .collect();
    let ratio = scoped.len() as f64 / operations.len() as f64;
    if ratio <= TENANT_HEADER_MAJORITY {
        return Evidence::none();
    }
    let note = format!(
        "{} of {} non-admin operations ({:.0}%)",
        scoped.len(),
        operations.len(),
        ratio * 100.0
    );
    Evidence::from_examples(scoped).with_note(note)
}

fn tenant_paths(doc: &Document) -> Evidence {
    Evidence::from_examples(
        doc.paths()
            .into_iter()
            .map(|(path, _)| path)
            .filter(|path| {
                path.split('/').any(|seg| TENANT_SEGMENTS.contains(&seg))
                    || template_names(path)
                        .iter()
                        .any(|name| TENANT_TEMPLATES.contains(name))
            })
            .map(str::to_string)
            .collect(),
    )
}

fn oauth2_scopes(doc: &Document) -> Evidence {
    Evidence::from_examples(
        doc.security_schemes()
            .into_iter()
            .filter(|(_, scheme)| {
                scheme.get("type").and_then(Value::as_str) == Some("oauth2")
                    && scheme
                        .get("flows")
                        .and_then(Value::as_object)
                        .is_some_and(|flows| {
                            flows.values().any(|flow| {
                                flow.get("scopes")
                                    .and_then(Value::as_object)
                                    .is_some_and(|scopes| !scopes.is_empty())
                            })
                        })
            })
            .map(|(name, _)| name.to_string())
            .collect(),
    )
}

fn api_id(doc: &Document) -> Evidence {
    Evidence::from_examples(doc.api_id().map(str::to_string).into_iter().collect())
}

fn rate_limit_headers(doc: &Document) -> Evidence {
    Evidence::from_examples(
        doc.operations()
            .iter()
            .filter(|op| {
                op.responses(doc).iter().any(|(_, response)| {
                    doc.deref(response)
                        .and_then(|r| r.get("headers"))
                        .and_then(Value::as_object)
                        .is_some_and(|headers| {
                            headers.keys().any(|k| {
                                let k = k.to_ascii_lowercase();
                                k.starts_with("x-ratelimit") || k.starts_with("ratelimit")
                            })
                        })
                })
            })
            .map(|op| op.label())
            .collect(),
    )
}

fn admin_operations(doc: &Document) -> Evidence {
    Evidence::from_examples(
        doc.operations()
            .iter()
            .filter(|op| op.is_admin())
            .map(|op| op.label())
            .collect(),
    )
}

fn webhooks(doc: &Document) -> Evidence {
    let root = doc.root();
    let names: Vec<String> = ["webhooks", "x-webhooks"]
        .iter()
        .filter_map(|key| root.get(*key).and_then(Value::as_object))
        .flat_map(|hooks| hooks.keys().cloned())
        .collect();
    Evidence::from_examples(names)
}
