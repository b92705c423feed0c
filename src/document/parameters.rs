//! Effective-parameter view
//!
//! Path-level parameters are inherited by every operation under the path
//! unless the operation declares a parameter with the same identity.
//! Identity is the resolved `(name, in)` pair; a reference that cannot be
//! resolved is identified by its `$ref` string instead.

use super::{ref_target, Document, Operation};
use serde_json::Value;

/// Identity used to decide whether an operation parameter overrides a path parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterKey {
    Named { name: String, location: String },
    Unresolved(String),
    Anonymous,
}

/// A parameter as seen by one operation
#[derive(Debug, Clone, Copy)]
pub struct EffectiveParameter<'a> {
    /// Declaration as written (may be a `$ref`)
    pub raw: &'a Value,
    /// Resolved parameter object, when the reference resolves
    pub resolved: Option<&'a Value>,
    /// Declared on the path item rather than the operation
    pub inherited: bool,
}

impl<'a> EffectiveParameter<'a> {
    pub fn name(&self) -> Option<&'a str> {
        self.resolved?.get("name").and_then(Value::as_str)
    }

    /// `in` field: `path`, `query`, `header` or `cookie`
    pub fn location(&self) -> Option<&'a str> {
        self.resolved?.get("in").and_then(Value::as_str)
    }

    pub fn is_required(&self) -> bool {
        self.resolved
            .and_then(|p| p.get("required"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn description(&self) -> Option<&'a str> {
        self.resolved?
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.trim().is_empty())
    }

    pub fn key(&self) -> ParameterKey {
        parameter_key(self.raw, self.resolved)
    }

    /// Name and location match; header names compare case-insensitively
    pub fn matches(&self, name: &str, location: Option<&str>) -> bool {
        let Some(own_name) = self.name() else {
            return false;
        };
        if let Some(loc) = location {
            if self.location() != Some(loc) {
                return false;
            }
        }
        if self.location() == Some("header") {
            own_name.eq_ignore_ascii_case(name)
        } else {
            own_name == name
        }
    }
}

fn parameter_key(raw: &Value, resolved: Option<&Value>) -> ParameterKey {
    if let Some(param) = resolved {
        if let Some(name) = param.get("name").and_then(Value::as_str) {
            let location = param
                .get("in")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            // HTTP header names are case-insensitive
            let name = if location == "header" {
                name.to_ascii_lowercase()
            } else {
                name.to_string()
            };
            return ParameterKey::Named { name, location };
        }
    }
    match ref_target(raw) {
        Some(target) => ParameterKey::Unresolved(target.to_string()),
        None => ParameterKey::Anonymous,
    }
}

fn declared<'a>(doc: &'a Document, node: &'a Value, inherited: bool) -> Vec<EffectiveParameter<'a>> {
    node.get("parameters")
        .and_then(Value::as_array)
        .map(|params| {
            params
                .iter()
                .map(|raw| EffectiveParameter {
                    raw,
                    resolved: doc.deref(raw),
                    inherited,
                })
                .collect()
        })
        .unwrap_or_default()
}

impl Document {
    /// Inherited path-level parameters (declaration order) not overridden by the
    /// operation, followed by all operation-level parameters (declaration order).
    pub fn resolve_effective_parameters<'a>(
        &'a self,
        path_item: &'a Value,
        operation: &'a Value,
    ) -> Vec<EffectiveParameter<'a>> {
        let own = declared(self, operation, false);
        let own_keys: Vec<ParameterKey> = own
            .iter()
            .map(EffectiveParameter::key)
            .filter(|k| *k != ParameterKey::Anonymous)
            .collect();

        let mut effective: Vec<EffectiveParameter<'a>> = declared(self, path_item, true)
            .into_iter()
            .filter(|p| !own_keys.contains(&p.key()))
            .collect();
        effective.extend(own);
        effective
    }

    /// Whether the operation sees a parameter with this name (and location, if given)
    pub fn has_parameter(
        &self,
        path_item: &Value,
        operation: &Value,
        name: &str,
        location: Option<&str>,
    ) -> bool {
        self.resolve_effective_parameters(path_item, operation)
            .iter()
            .any(|p| p.matches(name, location))
    }
}

impl<'a> Operation<'a> {
    pub fn effective_parameters(&self, doc: &'a Document) -> Vec<EffectiveParameter<'a>> {
        doc.resolve_effective_parameters(self.path_item, self.node)
    }

    pub fn has_parameter(&self, doc: &'a Document, name: &str, location: Option<&str>) -> bool {
        doc.has_parameter(self.path_item, self.node, name, location)
    }

    /// True when any header parameter matches one of `names`
    pub fn has_any_header(&self, doc: &'a Document, names: &[&str]) -> bool {
        self.effective_parameters(doc).iter().any(|p| {
            p.location() == Some("header")
                && p.name()
                    .is_some_and(|n| names.iter().any(|want| want.eq_ignore_ascii_case(n)))
        })
    }
}
