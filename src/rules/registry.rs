//! Rule registry
//!
//! The built-in catalogue is assembled once per process and shared read-only.
//! Project configuration produces a derived registry with rules disabled or
//! re-weighted; the built-in one is never mutated.

use crate::config::{ConfigError, RuleOverride};
use crate::models::Category;
use crate::rules::base::Rule;
use crate::rules::catalog;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};
use tracing::debug;

static BUILTIN: OnceLock<Arc<RuleRegistry>> = OnceLock::new();

/// Ordered, id-indexed collection of rules
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    index: HashMap<&'static str, usize>,
}

impl RuleRegistry {
    /// Build a registry, rejecting duplicate ids and invalid point values
    pub fn new(rules: Vec<Rule>) -> Result<Self, ConfigError> {
        let mut seen = HashMap::new();
        for rule in &rules {
            if seen.insert(rule.id, ()).is_some() {
                return Err(ConfigError::DuplicateRule(rule.id.to_string()));
            }
            validate_points(rule.id, rule.points)?;
        }
        Ok(Self::indexed(rules))
    }

    /// Shared built-in catalogue
    pub fn builtin() -> Arc<RuleRegistry> {
        Arc::clone(BUILTIN.get_or_init(|| {
            let registry = Self::indexed(catalog::builtin_rules());
            debug!("Initialized built-in rule registry with {} rules", registry.len());
            Arc::new(registry)
        }))
    }

    fn indexed(rules: Vec<Rule>) -> Self {
        let index = rules.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
        Self { rules, index }
    }

    /// Derive a registry with per-rule overrides applied.
    ///
    /// Unknown rule ids and invalid values are configuration errors.
    pub fn with_overrides(
        &self,
        overrides: &BTreeMap<String, RuleOverride>,
    ) -> Result<RuleRegistry, ConfigError> {
        for id in overrides.keys() {
            if !self.contains(id) {
                return Err(ConfigError::UnknownRule {
                    context: "rules".to_string(),
                    rule_id: id.clone(),
                });
            }
        }

        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let Some(ovr) = overrides.get(rule.id) else {
                rules.push(rule.clone());
                continue;
            };
            if ovr.enabled == Some(false) {
                debug!("Rule {} disabled by configuration", rule.id);
                continue;
            }
            let mut rule = rule.clone();
            if let Some(severity) = ovr.severity {
                rule.severity = severity;
            }
            if let Some(points) = ovr.points {
                validate_points(rule.id, points)?;
                rule.points = points;
            }
            if let Some(category) = ovr.category {
                if (category == Category::Prerequisite) != rule.is_prerequisite() {
                    return Err(ConfigError::InvalidRule {
                        rule_id: rule.id.to_string(),
                        reason: "cannot move a rule into or out of the prerequisite category"
                            .to_string(),
                    });
                }
                rule.category = category;
            }
            rules.push(rule);
        }
        Ok(Self::indexed(rules))
    }

    /// Copy of this registry without the given rule ids
    pub fn without(&self, disabled: &[String]) -> RuleRegistry {
        let rules = self
            .rules
            .iter()
            .filter(|r| !disabled.iter().any(|d| d == r.id))
            .cloned()
            .collect();
        Self::indexed(rules)
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.index.get(id).map(|&i| &self.rules[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id).collect()
    }

    pub fn by_category(&self, category: Category) -> Vec<&Rule> {
        self.rules.iter().filter(|r| r.category == category).collect()
    }

    /// Rules that contribute points (everything but prerequisites)
    pub fn scored_rules(&self) -> Vec<&Rule> {
        self.rules.iter().filter(|r| !r.is_prerequisite()).collect()
    }

    /// Maximum points available in a category
    pub fn category_points(&self, category: Category) -> f64 {
        self.by_category(category).iter().map(|r| r.points).sum()
    }
}

fn validate_points(rule_id: &str, points: f64) -> Result<(), ConfigError> {
    if points.is_finite() && points >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidRule {
            rule_id: rule_id.to_string(),
            reason: format!("points must be a finite, non-negative number (got {points})"),
        })
    }
}
