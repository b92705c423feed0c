//! API style classifier
//!
//! Scores a document against three pattern families (REST, gRPC transcoding,
//! enterprise SaaS). Each family is a list of weighted pattern detectors:
//!
//! ```text
//! score = sum(weight of detectors that fired) / sum(all weights) * 100
//! ```
//!
//! The best-scoring family (if it reaches 50) suggests a grading profile.
//! Ties prefer SaaS, then gRPC, then REST, since those profiles are stricter.

mod grpc;
mod rest;
mod saas;

use crate::document::Document;
use crate::profiles::DEFAULT_PROFILE;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Minimum family score for a profile suggestion
pub const SUGGESTION_THRESHOLD: f64 = 50.0;

/// Examples listed per evidence line
const MAX_EXAMPLES: usize = 3;

static BUILTIN_FAMILIES: OnceLock<Vec<PatternFamily>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiStyle {
    Rest,
    Grpc,
    EnterpriseSaas,
}

impl ApiStyle {
    /// Profile suggested for documents of this style
    pub fn profile(&self) -> &'static str {
        match self {
            ApiStyle::Rest => "rest",
            ApiStyle::Grpc => "grpc",
            ApiStyle::EnterpriseSaas => "enterprise-saas",
        }
    }

    /// Tie-break rank; higher wins
    fn precedence(&self) -> u8 {
        match self {
            ApiStyle::Rest => 0,
            ApiStyle::Grpc => 1,
            ApiStyle::EnterpriseSaas => 2,
        }
    }
}

impl std::fmt::Display for ApiStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiStyle::Rest => write!(f, "REST"),
            ApiStyle::Grpc => write!(f, "gRPC"),
            ApiStyle::EnterpriseSaas => write!(f, "Enterprise SaaS"),
        }
    }
}

/// What a pattern detector saw
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    pub fired: bool,
    /// Measured share behind the signal, e.g. `7 of 9 operations`
    pub note: Option<String>,
    pub examples: Vec<String>,
}

impl Evidence {
    pub fn none() -> Self {
        Self::default()
    }

    /// Fired when at least one example was found
    pub fn from_examples(examples: Vec<String>) -> Self {
        Self {
            fired: !examples.is_empty(),
            note: None,
            examples,
        }
    }

    pub fn flag(fired: bool) -> Self {
        Self {
            fired,
            ..Self::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A weighted, pure predicate over the document
#[derive(Debug, Clone)]
pub struct PatternDetector {
    pub id: &'static str,
    pub description: &'static str,
    pub weight: f64,
    pub detect: fn(&Document) -> Evidence,
}

/// Pattern detectors for one API style
#[derive(Debug, Clone)]
pub struct PatternFamily {
    pub style: ApiStyle,
    pub detectors: Vec<PatternDetector>,
}

impl PatternFamily {
    fn fired<'a>(&'a self, doc: &Document) -> Vec<(&'a PatternDetector, Evidence)> {
        self.detectors
            .iter()
            .map(|d| (d, (d.detect)(doc)))
            .filter(|(_, evidence)| evidence.fired)
            .collect()
    }

    /// Fired weight over total weight, as a percentage
    pub fn calculate_score(&self, doc: &Document) -> f64 {
        let total: f64 = self.detectors.iter().map(|d| d.weight).sum();
        if total <= 0.0 {
            return 0.0;
        }
        let fired: f64 = self.fired(doc).iter().map(|(d, _)| d.weight).sum();
        fired / total * 100.0
    }

    /// One line per fired detector, with up to three examples
    pub fn get_evidence(&self, doc: &Document) -> Vec<String> {
        self.fired(doc)
            .into_iter()
            .map(|(detector, evidence)| {
                let headline = match &evidence.note {
                    Some(note) => format!("{}: {}", detector.description, note),
                    None => detector.description.to_string(),
                };
                if evidence.examples.is_empty() {
                    headline
                } else {
                    let examples: Vec<&str> = evidence
                        .examples
                        .iter()
                        .take(MAX_EXAMPLES)
                        .map(String::as_str)
                        .collect();
                    format!("{} (e.g. {})", headline, examples.join(", "))
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleScore {
    pub style: ApiStyle,
    pub score: f64,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// One entry per family, in family order
    pub scores: Vec<StyleScore>,
    /// Best family at or above the suggestion threshold
    pub primary: Option<ApiStyle>,
    pub suggested_profile: String,
}

impl Classification {
    pub fn score(&self, style: ApiStyle) -> f64 {
        self.scores
            .iter()
            .find(|s| s.style == style)
            .map(|s| s.score)
            .unwrap_or(0.0)
    }
}

pub struct PatternClassifier {
    families: &'static [PatternFamily],
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternClassifier {
    pub fn new() -> Self {
        Self {
            families: builtin_families(),
        }
    }

    pub fn families(&self) -> &[PatternFamily] {
        self.families
    }

    pub fn classify(&self, doc: &Document) -> Classification {
        let scores: Vec<StyleScore> = self
            .families
            .iter()
            .map(|family| StyleScore {
                style: family.style,
                score: family.calculate_score(doc),
                evidence: family.get_evidence(doc),
            })
            .collect();

        let primary = pick_primary(&scores);
        let suggested_profile = primary
            .map(|style| style.profile().to_string())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

        Classification {
            scores,
            primary,
            suggested_profile,
        }
    }
}

/// Highest score at or above the threshold; ties go to the stricter style
fn pick_primary(scores: &[StyleScore]) -> Option<ApiStyle> {
    scores
        .iter()
        .filter(|s| s.score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then(a.style.precedence().cmp(&b.style.precedence()))
        })
        .map(|s| s.style)
}

pub fn builtin_families() -> &'static [PatternFamily] {
    BUILTIN_FAMILIES.get_or_init(|| {
        vec![
            PatternFamily {
                style: ApiStyle::Rest,
                detectors: rest::detectors(),
            },
            PatternFamily {
                style: ApiStyle::Grpc,
                detectors: grpc::detectors(),
            },
            PatternFamily {
                style: ApiStyle::EnterpriseSaas,
                detectors: saas::detectors(),
            },
        ]
    })
}

/// Classify with the built-in families
pub fn classify(doc: &Document) -> Classification {
    PatternClassifier::new().classify(doc)
}

/// Literal (non-template, non-version) segments of a path
fn literal_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| {
        !s.is_empty() && !s.starts_with('{') && !crate::document::is_version_segment(s)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn always(_doc: &Document) -> Evidence {
        Evidence::from_examples(vec!["a".into(), "b".into(), "c".into(), "d".into()])
    }

    fn never(_doc: &Document) -> Evidence {
        Evidence::none()
    }

    #[test]
    fn test_score_is_fired_weight_fraction() {
        let family = PatternFamily {
            style: ApiStyle::Rest,
            detectors: vec![
                PatternDetector { id: "x", description: "fires", weight: 3.0, detect: always },
                PatternDetector { id: "y", description: "silent", weight: 1.0, detect: never },
            ],
        };
        let doc = Document::new(json!({}));
        assert_eq!(family.calculate_score(&doc), 75.0);
        assert_eq!(family.get_evidence(&doc), vec!["fires (e.g. a, b, c)"]);
    }

    fn measured(_doc: &Document) -> Evidence {
        Evidence::from_examples(vec!["GET /a".into()]).with_note("1 of 1 operations")
    }

    #[test]
    fn test_evidence_note_leads_the_line() {
        let family = PatternFamily {
            style: ApiStyle::Grpc,
            detectors: vec![PatternDetector { id: "m", description: "measured", weight: 1.0, detect: measured }],
        };
        assert_eq!(
            family.get_evidence(&Document::new(json!({}))),
            vec!["measured: 1 of 1 operations (e.g. GET /a)"]
        );
    }

    #[test]
    fn test_protobuf_payloads_are_grpc_evidence() {
        let doc = Document::new(json!({"paths": {"/v1/books:stream": {"post": {
            "requestBody": {"content": {"application/x-protobuf": {}}},
            "responses": {"200": {"description": "ok", "content": {
                "application/grpc+proto": {},
                "text/event-stream": {}
            }}}
        }}}}));
        let result = classify(&doc);
        let grpc = result
            .scores
            .iter()
            .find(|s| s.style == ApiStyle::Grpc)
            .expect("grpc family scored");
        assert!(grpc
            .evidence
            .iter()
            .any(|line| line.starts_with("Payloads use protobuf") && line.contains("POST /v1/books:stream")));
        assert!(grpc.evidence.iter().any(|line| line.starts_with("Responses are streamed")));
        assert!(grpc.score >= 50.0, "score {}", grpc.score);
    }

    #[test]
    fn test_empty_document_suggests_default_profile() {
        let result = classify(&Document::new(json!({})));
        assert_eq!(result.primary, None);
        assert_eq!(result.suggested_profile, "standard");
        assert_eq!(result.scores.len(), 3);
    }

    #[test]
    fn test_rest_document() {
        let doc = Document::new(json!({
            "paths": {
                "/users": {
                    "get": {"responses": {"200": {}}},
                    "post": {"responses": {"201": {}}}
                },
                "/users/{userId}": {
                    "get": {"responses": {"200": {}}},
                    "put": {"responses": {"200": {}}},
                    "delete": {"responses": {"204": {}}}
                },
                "/users/{userId}/orders/{orderId}": {"get": {"responses": {"200": {}}}}
            }
        }));
        let result = classify(&doc);
        assert!(result.score(ApiStyle::Rest) >= 50.0);
        assert!(result.score(ApiStyle::Grpc) < 50.0);
        assert_eq!(result.primary, Some(ApiStyle::Rest));
        assert_eq!(result.suggested_profile, "rest");
    }

    #[test]
    fn test_grpc_document() {
        let doc = Document::new(json!({
            "paths": {
                "/v1/books:batchGet": {"post": {"operationId": "LibraryService_BatchGetBooks"}},
                "/v1/books:search": {"post": {"operationId": "LibraryService_SearchBooks"}},
                "/v1/shelves:list": {"post": {"operationId": "LibraryService_ListShelves"}}
            },
            "components": {"schemas": {"googleRpcStatus": {"type": "object"}}}
        }));
        let result = classify(&doc);
        assert_eq!(result.primary, Some(ApiStyle::Grpc));
        assert_eq!(result.suggested_profile, "grpc");
    }

    #[test]
    fn test_tie_prefers_saas() {
        let scores = [
            StyleScore { style: ApiStyle::Rest, score: 60.0, evidence: vec![] },
            StyleScore { style: ApiStyle::EnterpriseSaas, score: 60.0, evidence: vec![] },
            StyleScore { style: ApiStyle::Grpc, score: 60.0, evidence: vec![] },
        ];
        assert_eq!(pick_primary(&scores), Some(ApiStyle::EnterpriseSaas));
        assert_eq!(pick_primary(&scores[..1]), Some(ApiStyle::Rest));
        let low = [StyleScore { style: ApiStyle::Grpc, score: 49.9, evidence: vec![] }];
        assert_eq!(pick_primary(&low), None);
    }
}
