//! Resource-oriented REST patterns

use super::{literal_segments, Evidence, PatternDetector};
use crate::document::{template_names, Document};
use std::collections::BTreeSet;

pub(super) fn detectors() -> Vec<PatternDetector> {
    vec![
        PatternDetector {
            id: "rest-plural-collections",
            description: "Collections are named with plural nouns",
            weight: 3.0,
            detect: plural_collections,
        },
        PatternDetector {
            id: "rest-item-identifiers",
            description: "Items are addressed by identifier path parameters",
            weight: 3.0,
            detect: item_identifiers,
        },
        PatternDetector {
            id: "rest-verb-semantics",
            description: "HTTP methods carry the action",
            weight: 3.0,
            detect: verb_semantics,
        },
        PatternDetector {
            id: "rest-status-codes",
            description: "Resource-aware status codes (201 Created, 204 No Content)",
            weight: 2.0,
            detect: resource_status_codes,
        },
        PatternDetector {
            id: "rest-nested-resources",
            description: "Sub-resources are nested under their parent",
            weight: 1.0,
            detect: nested_resources,
        },
    ]
}

fn plural_collections(doc: &Document) -> Evidence {
    let collections: Vec<&str> = doc
        .paths()
        .into_iter()
        .map(|(path, _)| path)
        .filter(|path| !path.contains(':') && !path.trim_end_matches('/').ends_with('}'))
        .collect();
    if collections.is_empty() {
        return Evidence::none();
    }
    let plural: Vec<String> = collections
        .iter()
        .filter(|path| {
            literal_segments(path)
                .last()
                .is_some_and(|seg| seg.len() > 1 && seg.ends_with('s'))
        })
        .map(|path| path.to_string())
        .collect();
    if plural.len() * 2 >= collections.len() {
        Evidence::from_examples(plural)
    } else {
        Evidence::none()
    }
}

fn item_identifiers(doc: &Document) -> Evidence {
    Evidence::from_examples(
        doc.paths()
            .into_iter()
            .map(|(path, _)| path)
            .filter(|path| path.trim_end_matches('/').ends_with('}'))
            .map(str::to_string)
            .collect(),
    )
}

fn verb_semantics(doc: &Document) -> Evidence {
    let methods: BTreeSet<&str> = doc
        .operations()
        .iter()
        .map(|op| op.method)
        .filter(|m| matches!(*m, "get" | "post" | "put" | "patch" | "delete"))
        .collect();
    if methods.len() >= 3 {
        Evidence::from_examples(methods.iter().map(|m| m.to_uppercase()).collect())
    } else {
        Evidence::none()
    }
}

fn resource_status_codes(doc: &Document) -> Evidence {
    Evidence::from_examples(
        doc.operations()
            .iter()
            .filter_map(|op| {
                let code = match op.method {
                    "post" => "201",
                    "delete" => "204",
                    _ => return None,
                };
                op.has_response(doc, code)
                    .then(|| format!("{} -> {code}", op.label()))
            })
            .collect(),
    )
}

fn nested_resources(doc: &Document) -> Evidence {
    Evidence::from_examples(
        doc.paths()
            .into_iter()
            .map(|(path, _)| path)
            .filter(|path| template_names(path).len() >= 2)
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plural_collections_need_a_majority() {
        let doc = Document::new(json!({"paths": {
            "/users": {}, "/orders": {}, "/search": {}, "/users/{id}": {}
        }}));
        let evidence = plural_collections(&doc);
        assert!(evidence.fired);
        assert_eq!(evidence.examples, vec!["/orders", "/users"]);

        let doc = Document::new(json!({"paths": {"/search": {}, "/lookup": {}, "/users": {}}}));
        assert!(!plural_collections(&doc).fired);
    }

    #[test]
    fn test_verb_semantics_needs_three_methods() {
        let doc = Document::new(json!({"paths": {"/a": {"get": {}, "post": {}}}}));
        assert!(!verb_semantics(&doc).fired);
        let doc = Document::new(json!({"paths": {"/a": {"get": {}, "post": {}}, "/a/{id}": {"patch": {}}}}));
        assert_eq!(verb_semantics(&doc).examples, vec!["GET", "PATCH", "POST"]);
    }
}
