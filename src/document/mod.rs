//! Read-only view over a parsed API specification document
//!
//! The document is a JSON-compatible tree (`serde_json::Value`) produced by
//! an external decoder. Nothing here mutates it. Every accessor returns
//! `Option` instead of failing on a missing key, and `$ref` values are
//! resolved through [`Document::resolve_ref`] / [`Document::deref`].

mod parameters;
pub mod pointer;

pub use parameters::{EffectiveParameter, ParameterKey};

use serde_json::{Map, Value};

/// HTTP methods that can carry an operation under a path item, in report order
pub const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Maximum `$ref` hops before a chain is treated as unresolvable
const MAX_REF_DEPTH: usize = 16;

/// An immutable specification document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Value,
}

impl Document {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Resolve a local fragment pointer (`#/a/b/c`). Missing segments yield `None`.
    pub fn resolve_ref(&self, pointer: &str) -> Option<&Value> {
        let segments = pointer::parse_pointer(pointer)?;
        pointer::walk(&self.root, &segments)
    }

    /// Follow `$ref` chains starting at `node`. Nodes without `$ref` are returned as-is.
    pub fn deref<'a>(&'a self, node: &'a Value) -> Option<&'a Value> {
        let mut current = node;
        for _ in 0..MAX_REF_DEPTH {
            match ref_target(current) {
                Some(target) => current = self.resolve_ref(target)?,
                None => return Some(current),
            }
        }
        None
    }

    /// Walk raw segments from the root without following references
    pub fn get<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Value> {
        pointer::walk(&self.root, segments)
    }

    /// `openapi` version string, or the legacy `swagger` field
    pub fn openapi_version(&self) -> Option<&str> {
        self.root
            .get("openapi")
            .or_else(|| self.root.get("swagger"))
            .and_then(Value::as_str)
    }

    pub fn info(&self) -> Option<&Map<String, Value>> {
        self.root.get("info").and_then(Value::as_object)
    }

    /// Non-empty string field of `info`
    pub fn info_str(&self, key: &str) -> Option<&str> {
        self.info()?
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `info.x-api-id` exactly as written. Not trimmed, so a padded id stays malformed.
    pub fn api_id(&self) -> Option<&str> {
        self.info()?.get("x-api-id").and_then(Value::as_str)
    }

    /// Path items (references resolved), sorted by path
    pub fn paths(&self) -> Vec<(&str, &Value)> {
        let Some(paths) = self.root.get("paths").and_then(Value::as_object) else {
            return Vec::new();
        };
        let mut items: Vec<(&str, &Value)> = paths
            .iter()
            .filter_map(|(path, item)| {
                let item = self.deref(item)?;
                item.is_object().then_some((path.as_str(), item))
            })
            .collect();
        items.sort_by(|a, b| a.0.cmp(b.0));
        items
    }

    /// Every path × method operation in deterministic order
    pub fn operations(&self) -> Vec<Operation<'_>> {
        let mut ops = Vec::new();
        for (path, item) in self.paths() {
            for method in HTTP_METHODS {
                if let Some(node) = item.get(method).filter(|n| n.is_object()) {
                    ops.push(Operation {
                        path,
                        method,
                        path_item: item,
                        node,
                    });
                }
            }
        }
        ops
    }

    pub fn operation(&self, path: &str, method: &str) -> Option<Operation<'_>> {
        self.operations()
            .into_iter()
            .find(|op| op.path == path && op.method.eq_ignore_ascii_case(method))
    }

    /// Named entries of a `components` section (e.g. `schemas`), sorted by name
    pub fn components(&self, section: &str) -> Vec<(&str, &Value)> {
        let Some(map) = self
            .root
            .get("components")
            .and_then(|c| c.get(section))
            .and_then(Value::as_object)
        else {
            return Vec::new();
        };
        let mut entries: Vec<(&str, &Value)> =
            map.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn schemas(&self) -> Vec<(&str, &Value)> {
        self.components("schemas")
    }

    /// Security schemes with references resolved
    pub fn security_schemes(&self) -> Vec<(&str, &Value)> {
        self.components("securitySchemes")
            .into_iter()
            .filter_map(|(name, scheme)| self.deref(scheme).map(|s| (name, s)))
            .collect()
    }

    /// Top-level `security` requirement list, if declared
    pub fn global_security(&self) -> Option<&Vec<Value>> {
        self.root.get("security").and_then(Value::as_array)
    }

    /// `servers[].url` values
    pub fn server_urls(&self) -> Vec<&str> {
        self.root
            .get("servers")
            .and_then(Value::as_array)
            .map(|servers| {
                servers
                    .iter()
                    .filter_map(|s| s.get("url").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Names declared under the top-level `tags` list
    pub fn declared_tags(&self) -> Vec<&str> {
        self.root
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check whether a (possibly referenced) response declares a header.
    /// Existence of the key suffices; nested header references are not followed.
    pub fn response_has_header(&self, response: &Value, header: &str) -> bool {
        self.deref(response)
            .and_then(|r| r.get("headers"))
            .and_then(Value::as_object)
            .is_some_and(|headers| headers.keys().any(|k| k.eq_ignore_ascii_case(header)))
    }

    /// Media-type map of a (possibly referenced) response or request body
    pub fn content<'a>(&'a self, node: &'a Value) -> Option<&'a Map<String, Value>> {
        self.deref(node)?.get("content").and_then(Value::as_object)
    }
}

impl From<Value> for Document {
    fn from(root: Value) -> Self {
        Document::new(root)
    }
}

/// `$ref` string of a node, if it is a reference object
pub fn ref_target(node: &Value) -> Option<&str> {
    node.get("$ref").and_then(Value::as_str)
}

/// One path × method operation
#[derive(Debug, Clone, Copy)]
pub struct Operation<'a> {
    pub path: &'a str,
    pub method: &'a str,
    pub path_item: &'a Value,
    pub node: &'a Value,
}

impl<'a> Operation<'a> {
    /// Human identifier, e.g. `GET /users/{id}`
    pub fn label(&self) -> String {
        format!("{} {}", self.method.to_uppercase(), self.path)
    }

    /// Location pointer, e.g. `#/paths/~1users/get`
    pub fn location(&self) -> String {
        pointer::pointer_for(&["paths", self.path, self.method])
    }

    pub fn str_field(&self, key: &str) -> Option<&'a str> {
        self.node
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn operation_id(&self) -> Option<&'a str> {
        self.str_field("operationId")
    }

    pub fn tags(&self) -> Vec<&'a str> {
        self.node
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn is_deprecated(&self) -> bool {
        self.node.get("deprecated").and_then(Value::as_bool) == Some(true)
    }

    /// Admin endpoints are exempt from tenant-scoping requirements
    pub fn is_admin(&self) -> bool {
        let first_segment = self
            .path
            .trim_start_matches('/')
            .split('/')
            .find(|s| !s.is_empty() && !is_version_segment(s));
        first_segment.is_some_and(|s| s.eq_ignore_ascii_case("admin"))
            || self.tags().iter().any(|t| t.eq_ignore_ascii_case("admin"))
    }

    /// A collection endpoint: the last path segment is not a template parameter
    pub fn is_collection(&self) -> bool {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .is_some_and(|last| !last.is_empty() && !last.starts_with('{'))
    }

    /// Operation-level security overrides the global requirement.
    /// `Some(empty)` means the operation is explicitly public.
    pub fn effective_security(&self, doc: &'a Document) -> Option<&'a Vec<Value>> {
        self.node
            .get("security")
            .and_then(Value::as_array)
            .or_else(|| doc.global_security())
    }

    pub fn requires_auth(&self, doc: &'a Document) -> bool {
        self.effective_security(doc).is_some_and(|reqs| {
            reqs.iter()
                .any(|r| r.as_object().is_some_and(|m| !m.is_empty()))
        })
    }

    /// Responses keyed by status code, references resolved, sorted by code
    pub fn responses(&self, doc: &'a Document) -> Vec<(&'a str, &'a Value)> {
        let Some(map) = self.node.get("responses").and_then(Value::as_object) else {
            return Vec::new();
        };
        let mut responses: Vec<(&str, &Value)> = map
            .iter()
            .filter_map(|(code, resp)| doc.deref(resp).map(|r| (code.as_str(), r)))
            .collect();
        responses.sort_by(|a, b| a.0.cmp(b.0));
        responses
    }

    pub fn response(&self, doc: &'a Document, code: &str) -> Option<&'a Value> {
        let raw = self.node.get("responses")?.get(code)?;
        doc.deref(raw)
    }

    pub fn has_response(&self, doc: &'a Document, code: &str) -> bool {
        self.response(doc, code).is_some()
    }

    /// Responses whose code starts with the given class digit (`'2'`, `'4'`, ...).
    /// Range codes such as `2XX` match too.
    pub fn responses_in_class(&self, doc: &'a Document, class: char) -> Vec<(&'a str, &'a Value)> {
        self.responses(doc)
            .into_iter()
            .filter(|(code, _)| code.starts_with(class))
            .collect()
    }

    /// Request body, reference resolved
    pub fn request_body(&self, doc: &'a Document) -> Option<&'a Value> {
        doc.deref(self.node.get("requestBody")?)
    }

    /// Template parameter names in the path, e.g. `id` for `/users/{id}`
    pub fn path_template_names(&self) -> Vec<&'a str> {
        template_names(self.path)
    }
}

/// Names inside `{...}` of a path template
pub fn template_names(path: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else { break };
        names.push(&after[..end]);
        rest = &after[end + 1..];
    }
    names
}

/// `v1`, `v2`, `v10` ...
pub fn is_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && (segment.starts_with('v') || segment.starts_with('V'))
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests;
