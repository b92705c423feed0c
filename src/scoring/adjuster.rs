//! Dependency-aware score adjustment
//!
//! Some rules only mean something when another rule holds. Declaring
//! per-operation security requirements (SEC-002) is worth little if no
//! security scheme exists (SEC-001). The adjuster encodes those links as a
//! small directed graph and lowers dependent scores accordingly.
//!
//! Adjustments only ever lower a score towards a bound derived from its
//! sources, and sources are processed before their dependents, so running
//! the adjuster on its own output changes nothing.

use crate::config::ConfigError;
use crate::scoring::RuleScore;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// How a source rule limits a dependent rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionKind {
    /// Dependent coverage may not exceed source coverage
    Bounded,
    /// Below `min_source_coverage`, the dependent is capped at `ceiling` of its points
    Gated { min_source_coverage: f64, ceiling: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleInteraction {
    pub source: String,
    pub target: String,
    #[serde(flatten)]
    pub kind: InteractionKind,
}

impl RuleInteraction {
    pub fn bounded(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            kind: InteractionKind::Bounded,
        }
    }

    pub fn gated(source: &str, target: &str, min_source_coverage: f64, ceiling: f64) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            kind: InteractionKind::Gated {
                min_source_coverage,
                ceiling,
            },
        }
    }
}

/// Externally supplied score override, in points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOverride {
    pub rule_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ScoreOverride {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidOverride {
            rule_id: self.rule_id.clone(),
            reason: reason.to_string(),
        };
        if self.set.is_none() && self.cap.is_none() {
            return Err(invalid("override needs `set` or `cap`"));
        }
        for value in [self.set, self.cap].into_iter().flatten() {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid("override values must be finite and non-negative"));
            }
        }
        Ok(())
    }
}

/// Interactions between built-in rules
pub fn builtin_interactions() -> Vec<RuleInteraction> {
    vec![
        RuleInteraction::bounded("SEC-001", "SEC-002"),
        RuleInteraction::bounded("SEC-001", "SEC-005"),
        RuleInteraction::bounded("FUNC-001", "FUNC-005"),
        RuleInteraction::gated("FUNC-007", "EXC-005", 0.5, 0.5),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct ScoreAdjuster {
    /// Interactions in dependency order
    interactions: Vec<RuleInteraction>,
    overrides: Vec<ScoreOverride>,
}

impl ScoreAdjuster {
    /// Validate and order the interaction graph. Cycles are rejected.
    pub fn new(
        interactions: Vec<RuleInteraction>,
        overrides: Vec<ScoreOverride>,
    ) -> Result<Self, ConfigError> {
        for ovr in &overrides {
            ovr.validate()?;
        }

        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
        for interaction in &interactions {
            if let InteractionKind::Gated {
                min_source_coverage,
                ceiling,
            } = interaction.kind
            {
                let in_unit = |v: f64| (0.0..=1.0).contains(&v);
                if !in_unit(min_source_coverage) || !in_unit(ceiling) {
                    return Err(ConfigError::InvalidOverride {
                        rule_id: interaction.target.clone(),
                        reason: "gate thresholds must lie in [0, 1]".to_string(),
                    });
                }
            }
            let source = *nodes
                .entry(interaction.source.as_str())
                .or_insert_with(|| graph.add_node(interaction.source.as_str()));
            let target = *nodes
                .entry(interaction.target.as_str())
                .or_insert_with(|| graph.add_node(interaction.target.as_str()));
            graph.add_edge(source, target, ());
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            ConfigError::InteractionCycle(graph[cycle.node_id()].to_string())
        })?;
        let rank: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, idx)| (graph[*idx], i))
            .collect();

        let mut ordered = interactions.clone();
        // stable: ties keep declaration order
        ordered.sort_by_key(|i| rank.get(i.source.as_str()).copied().unwrap_or(usize::MAX));

        Ok(Self {
            interactions: ordered,
            overrides,
        })
    }

    /// Built-in interactions, no overrides
    pub fn builtin() -> Self {
        Self {
            interactions: builtin_interactions(),
            overrides: Vec::new(),
        }
    }

    pub fn with_overrides(self, overrides: Vec<ScoreOverride>) -> Result<Self, ConfigError> {
        Self::new(self.interactions, overrides)
    }

    pub fn interactions(&self) -> &[RuleInteraction] {
        &self.interactions
    }

    pub fn overrides(&self) -> &[ScoreOverride] {
        &self.overrides
    }

    /// Apply overrides, then interactions. Rules missing from `scores` are skipped.
    pub fn adjust(&self, scores: &[RuleScore]) -> Vec<RuleScore> {
        let mut adjusted = scores.to_vec();
        let index: HashMap<String, usize> = adjusted
            .iter()
            .enumerate()
            .map(|(i, s)| (s.rule_id.clone(), i))
            .collect();

        for ovr in &self.overrides {
            let Some(&i) = index.get(&ovr.rule_id) else {
                debug!("Override for inactive rule {} ignored", ovr.rule_id);
                continue;
            };
            let score = &mut adjusted[i];
            if let Some(set) = ovr.set {
                let note = match &ovr.reason {
                    Some(reason) => format!("score set to {set} by override: {reason}"),
                    None => format!("score set to {set} by override"),
                };
                set_score(score, set, note);
            }
            if let Some(cap) = ovr.cap {
                if score.score > cap {
                    let note = format!("score capped at {cap} by override");
                    set_score(score, cap, note);
                }
            }
        }

        for interaction in &self.interactions {
            let (Some(&src), Some(&dst)) = (
                index.get(&interaction.source),
                index.get(&interaction.target),
            ) else {
                continue;
            };
            let source_coverage = adjusted[src].coverage;
            let target = &mut adjusted[dst];
            let limit = match interaction.kind {
                InteractionKind::Bounded => source_coverage,
                InteractionKind::Gated {
                    min_source_coverage,
                    ceiling,
                } => {
                    if source_coverage >= min_source_coverage {
                        continue;
                    }
                    ceiling
                }
            };
            if target.coverage > limit {
                let note = format!(
                    "limited by {} (coverage {:.0}%)",
                    interaction.source,
                    source_coverage * 100.0
                );
                debug!("{}: {}", target.rule_id, note);
                target.coverage = limit;
                target.score = limit * target.max_score;
                push_note(target, note);
            }
        }
        adjusted
    }
}

fn set_score(score: &mut RuleScore, points: f64, note: String) {
    score.score = points.min(score.max_score);
    score.coverage = if score.max_score > 0.0 {
        score.score / score.max_score
    } else {
        score.coverage
    };
    push_note(score, note);
}

fn push_note(score: &mut RuleScore, note: String) {
    if !score.adjustments.contains(&note) {
        score.adjustments.push(note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn score(id: &str, coverage: f64, max: f64) -> RuleScore {
        RuleScore {
            rule_id: id.to_string(),
            name: id.to_string(),
            category: Category::Security,
            max_score: max,
            coverage,
            score: coverage * max,
            targets_checked: 4,
            targets_passed: (coverage * 4.0) as usize,
            applicable: true,
            faulted: false,
            findings: Vec::new(),
            adjustments: Vec::new(),
        }
    }

    #[test]
    fn test_bounded_interaction_lowers_dependent() {
        let scores = vec![score("SEC-001", 0.0, 6.0), score("SEC-002", 1.0, 6.0)];
        let adjusted = ScoreAdjuster::builtin().adjust(&scores);
        assert_eq!(adjusted[1].score, 0.0);
        assert_eq!(adjusted[1].adjustments.len(), 1);
        // identity preserved
        assert_eq!(adjusted[1].rule_id, "SEC-002");
        assert_eq!(adjusted[1].max_score, 6.0);
    }

    #[test]
    fn test_gated_interaction() {
        let scores = vec![score("FUNC-007", 0.25, 4.0), score("EXC-005", 1.0, 2.0)];
        let adjusted = ScoreAdjuster::builtin().adjust(&scores);
        assert_eq!(adjusted[1].score, 1.0);

        let scores = vec![score("FUNC-007", 0.5, 4.0), score("EXC-005", 1.0, 2.0)];
        let adjusted = ScoreAdjuster::builtin().adjust(&scores);
        assert_eq!(adjusted[1].score, 2.0);
    }

    #[test]
    fn test_adjust_is_idempotent() {
        let adjuster = ScoreAdjuster::new(
            vec![
                RuleInteraction::bounded("B", "C"),
                RuleInteraction::bounded("A", "B"),
            ],
            vec![ScoreOverride {
                rule_id: "C".to_string(),
                set: Some(3.0),
                cap: None,
                reason: None,
            }],
        )
        .expect("acyclic");
        let scores = vec![score("A", 0.25, 4.0), score("B", 0.75, 4.0), score("C", 0.5, 4.0)];
        let once = adjuster.adjust(&scores);
        let twice = adjuster.adjust(&once);
        assert_eq!(once, twice);
        // A bounds B, which bounds C
        assert_eq!(once[1].coverage, 0.25);
        assert_eq!(once[2].coverage, 0.25);
    }

    #[test]
    fn test_missing_rules_are_skipped() {
        let scores = vec![score("SEC-002", 1.0, 6.0)];
        assert_eq!(ScoreAdjuster::builtin().adjust(&scores), scores);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = ScoreAdjuster::new(
            vec![RuleInteraction::bounded("A", "B"), RuleInteraction::bounded("B", "A")],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InteractionCycle(_)));
    }

    #[test]
    fn test_override_needs_a_value() {
        let err = ScoreAdjuster::new(
            Vec::new(),
            vec![ScoreOverride {
                rule_id: "X".to_string(),
                set: None,
                cap: None,
                reason: None,
            }],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));
    }

    #[test]
    fn test_cap_override() {
        let adjuster = ScoreAdjuster::new(
            Vec::new(),
            vec![ScoreOverride {
                rule_id: "SEC-002".to_string(),
                set: None,
                cap: Some(1.5),
                reason: None,
            }],
        )
        .expect("valid");
        let adjusted = adjuster.adjust(&[score("SEC-002", 1.0, 6.0)]);
        assert_eq!(adjusted[0].score, 1.5);
        assert_eq!(adjusted[0].coverage, 0.25);
    }
}
