//! gRPC-over-HTTP (transcoding) patterns

use super::{Evidence, PatternDetector};
use crate::document::{Document, Operation};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

static SERVICE_PATH: OnceLock<Regex> = OnceLock::new();
static RPC_OPERATION_ID: OnceLock<Regex> = OnceLock::new();

fn service_path() -> &'static Regex {
    SERVICE_PATH.get_or_init(|| {
        Regex::new(r"^/[A-Za-z0-9_]+(\.[A-Za-z0-9_]+)+/[A-Z][A-Za-z0-9]*$")
            .expect("service path pattern is valid")
    })
}

fn rpc_operation_id() -> &'static Regex {
    RPC_OPERATION_ID.get_or_init(|| {
        Regex::new(r"^[A-Z][A-Za-z0-9]*_[A-Z][A-Za-z0-9]*$").expect("operation id pattern is valid")
    })
}

const RPC_STATUS_SCHEMAS: [&str; 4] = ["Status", "rpcStatus", "googleRpcStatus", "google.rpc.Status"];

/// Share of POST operations that marks an RPC surface
const POST_ONLY_RATIO: f64 = 0.8;

const STREAMING_MEDIA_TYPES: [&str; 4] = [
    "text/event-stream",
    "application/x-ndjson",
    "application/jsonl",
    "application/stream+json",
];

/// grpc-gateway's description suffix for server-streaming responses
const STREAMING_MARKER: &str = "(streaming responses)";

pub(super) fn detectors() -> Vec<PatternDetector> {
    vec![
        PatternDetector {
            id: "grpc-custom-methods",
            description: "Custom methods use the `resource:verb` suffix",
            weight: 4.0,
            detect: custom_methods,
        },
        PatternDetector {
            id: "grpc-post-only",
            description: "Nearly every operation is a POST",
            weight: 3.0,
            detect: post_only,
        },
        PatternDetector {
            id: "grpc-service-paths",
            description: "Paths follow /package.Service/Method",
            weight: 3.0,
            detect: service_paths,
        },
        PatternDetector {
            id: "grpc-protobuf-media",
            description: "Payloads use protobuf or gRPC media types",
            weight: 3.0,
            detect: protobuf_media,
        },
        PatternDetector {
            id: "grpc-streaming",
            description: "Responses are streamed",
            weight: 2.0,
            detect: streaming_responses,
        },
        PatternDetector {
            id: "grpc-operation-ids",
            description: "operationIds follow Service_Method",
            weight: 2.0,
            detect: rpc_operation_ids,
        },
        PatternDetector {
            id: "grpc-status-schema",
            description: "Errors use the google.rpc.Status model",
            weight: 2.0,
            detect: rpc_status_schema,
        },
    ]
}

fn custom_methods(doc: &Document) -> Evidence {
    Evidence::from_examples(
        doc.paths()
            .into_iter()
            .map(|(path, _)| path)
            .filter(|path| path.rsplit('/').next().is_some_and(|last| last.contains(':')))
            .map(str::to_string)
            .collect(),
    )
}

fn post_only(doc: &Document) -> Evidence {
    let ops = doc.operations();
    if ops.is_empty() {
        return Evidence::none();
    }
    let posts = ops.iter().filter(|op| op.method == "post").count();
    let ratio = posts as f64 / ops.len() as f64;
    if ratio >= POST_ONLY_RATIO {
        Evidence::from_examples(
            ops.iter()
                .filter(|op| op.method == "post")
                .map(|op| op.label())
                .collect(),
        )
        .with_note(format!("{posts} of {} operations", ops.len()))
    } else {
        Evidence::none()
    }
}

/// Media types of the request body and every response, without parameters
fn media_types<'a>(doc: &'a Document, op: &Operation<'a>) -> Vec<String> {
    let mut nodes: Vec<&Value> = op.responses(doc).into_iter().map(|(_, r)| r).collect();
    nodes.extend(op.request_body(doc));
    nodes
        .into_iter()
        .filter_map(|node| doc.content(node))
        .flat_map(|content| content.keys())
        .map(|media| {
            media
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
        .collect()
}

fn is_protobuf_media(media: &str) -> bool {
    media.starts_with("application/grpc") || media.contains("protobuf")
}

fn protobuf_media(doc: &Document) -> Evidence {
    Evidence::from_examples(
        doc.operations()
            .iter()
            .filter(|op| media_types(doc, op).iter().any(|m| is_protobuf_media(m)))
            .map(|op| op.label())
            .collect(),
    )
}

fn streams_responses<'a>(doc: &'a Document, op: &Operation<'a>) -> bool {
    let marked = op.responses(doc).iter().any(|(_, response)| {
        doc.deref(response)
            .and_then(|r| r.get("description"))
            .and_then(Value::as_str)
            .is_some_and(|d| d.contains(STREAMING_MARKER))
    });
    marked
        || media_types(doc, op)
            .iter()
            .any(|m| STREAMING_MEDIA_TYPES.contains(&m.as_str()))
}

fn streaming_responses(doc: &Document) -> Evidence {
    Evidence::from_examples(
        doc.operations()
            .iter()
            .filter(|op| streams_responses(doc, op))
            .map(|op| op.label())
            .collect(),
    )
}

fn service_paths(doc: &Document) -> Evidence {
    Evidence::from_examples(
        doc.paths()
            .into_iter()
            .map(|(path, _)| path)
            .filter(|path| service_path().is_match(path))
            .map(str::to_string)
            .collect(),
    )
}

fn rpc_operation_ids(doc: &Document) -> Evidence {
    Evidence::from_examples(
        doc.operations()
            .iter()
            .filter_map(|op| op.operation_id())
            .filter(|id| rpc_operation_id().is_match(id))
            .map(str::to_string)
            .collect(),
    )
}

fn rpc_status_schema(doc: &Document) -> Evidence {
    Evidence::from_examples(
        doc.schemas()
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| RPC_STATUS_SCHEMAS.contains(name))
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_paths() {
        let doc = Document::new(json!({"paths": {
            "/acme.library.v1.LibraryService/GetBook": {"post": {}},
            "/books/{id}": {"get": {}}
        }}));
        assert_eq!(
            service_paths(&doc).examples,
            vec!["/acme.library.v1.LibraryService/GetBook"]
        );
        // 1 of 2 operations is a POST
        assert!(!post_only(&doc).fired);
    }

    #[test]
    fn test_rpc_operation_ids() {
        let doc = Document::new(json!({"paths": {
            "/a": {"post": {"operationId": "Library_GetBook"}},
            "/b": {"get": {"operationId": "getBook"}}
        }}));
        assert_eq!(rpc_operation_ids(&doc).examples, vec!["Library_GetBook"]);
    }

    #[test]
    fn test_protobuf_and_streaming_media() {
        let doc = Document::new(json!({"paths": {
            "/v1/books:watch": {"post": {
                "requestBody": {"content": {"application/x-protobuf": {}}},
                "responses": {"200": {"content": {
                    "application/grpc+proto": {},
                    "text/event-stream; charset=utf-8": {}
                }}}
            }},
            "/v1/shelves": {"get": {
                "responses": {"200": {"content": {"application/json": {}}}}
            }},
            "/v1/events": {"get": {
                "responses": {"200": {"description": "A successful response.(streaming responses)"}}
            }}
        }}));
        assert_eq!(protobuf_media(&doc).examples, vec!["POST /v1/books:watch"]);
        assert_eq!(
            streaming_responses(&doc).examples,
            vec!["POST /v1/books:watch", "GET /v1/events"]
        );
    }

    #[test]
    fn test_json_only_api_has_no_media_evidence() {
        let doc = Document::new(json!({"paths": {"/books": {"get": {
            "responses": {"200": {"content": {"application/json": {}}}}
        }}}}));
        assert!(!protobuf_media(&doc).fired);
        assert!(!streaming_responses(&doc).fired);
    }

    #[test]
    fn test_post_only_reports_share() {
        let doc = Document::new(json!({"paths": {"/a:run": {"post": {}}, "/b:run": {"post": {}}}}));
        let evidence = post_only(&doc);
        assert_eq!(evidence.note.as_deref(), Some("2 of 2 operations"));
        assert_eq!(evidence.examples, vec!["POST /a:run", "POST /b:run"]);
    }
}
