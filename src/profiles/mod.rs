//! Grading profiles
//!
//! A profile selects which prerequisites apply and which scored rules are
//! switched off for a given API style. Built-in profiles:
//!
//! - `standard`: authentication and HTTPS, API id required
//! - `rest`: same prerequisites as `standard`
//! - `grpc`: HTTP-style rules that do not fit transcoded RPC methods are disabled
//! - `enterprise-saas`: adds tenant scoping and request correlation
//!
//! Additional profiles can be declared in the project configuration.

use crate::config::ConfigError;
use crate::rules::RuleRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const DEFAULT_PROFILE: &str = "standard";

static BUILTIN_PROFILES: OnceLock<Vec<GradingProfile>> = OnceLock::new();

/// Policy controlling the prerequisite gate and the active rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingProfile {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Enforce PREREQ-001
    #[serde(default = "default_true")]
    pub requires_authentication: bool,

    /// Enforce PREREQ-003 (X-Organization-ID)
    #[serde(default)]
    pub requires_multi_tenant_headers: bool,

    /// Enforce PREREQ-API-ID and PREREQ-API-ID-FORMAT
    #[serde(default = "default_true")]
    pub requires_api_id: bool,

    /// Extra rule ids evaluated as prerequisites
    #[serde(default)]
    pub custom_prerequisites: Vec<String>,

    /// Scored rules switched off under this profile
    #[serde(default)]
    pub disabled_rules: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for GradingProfile {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROFILE.to_string(),
            description: String::new(),
            requires_authentication: true,
            requires_multi_tenant_headers: false,
            requires_api_id: true,
            custom_prerequisites: Vec::new(),
            disabled_rules: Vec::new(),
        }
    }
}

impl GradingProfile {
    pub fn is_rule_disabled(&self, rule_id: &str) -> bool {
        self.disabled_rules.iter().any(|r| r == rule_id)
    }

    /// Every rule id this profile names must exist in the registry
    pub fn validate(&self, registry: &RuleRegistry) -> Result<(), ConfigError> {
        let named = self
            .custom_prerequisites
            .iter()
            .map(|id| ("custom_prerequisites", id))
            .chain(self.disabled_rules.iter().map(|id| ("disabled_rules", id)));
        for (field, id) in named {
            if !registry.contains(id) {
                return Err(ConfigError::UnknownRule {
                    context: format!("profile '{}' {}", self.name, field),
                    rule_id: id.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Built-in profiles, in display order
pub fn builtin_profiles() -> &'static [GradingProfile] {
    BUILTIN_PROFILES.get_or_init(|| {
        vec![
            GradingProfile {
                name: "standard".to_string(),
                description: "General-purpose HTTP APIs".to_string(),
                ..Default::default()
            },
            GradingProfile {
                name: "rest".to_string(),
                description: "Resource-oriented REST APIs".to_string(),
                ..Default::default()
            },
            GradingProfile {
                name: "grpc".to_string(),
                description: "gRPC services exposed through HTTP transcoding".to_string(),
                disabled_rules: vec![
                    "FUNC-006".to_string(),
                    "MAINT-005".to_string(),
                    "SCALE-004".to_string(),
                ],
                ..Default::default()
            },
            GradingProfile {
                name: "enterprise-saas".to_string(),
                description: "Multi-tenant SaaS platform APIs".to_string(),
                requires_multi_tenant_headers: true,
                custom_prerequisites: vec!["PREREQ-004".to_string()],
                ..Default::default()
            },
        ]
    })
}

pub fn builtin_profile(name: &str) -> Option<&'static GradingProfile> {
    builtin_profiles().iter().find(|p| p.name == name)
}

/// Built-in profiles plus profiles declared in configuration.
/// A configured profile with a built-in name replaces the built-in one.
#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    profiles: BTreeMap<String, GradingProfile>,
}

impl Default for ProfileCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProfileCatalog {
    pub fn builtin() -> Self {
        let profiles = builtin_profiles()
            .iter()
            .map(|p| (p.name.clone(), p.clone()))
            .collect();
        Self { profiles }
    }

    pub fn with_custom(
        mut self,
        custom: &BTreeMap<String, GradingProfile>,
        registry: &RuleRegistry,
    ) -> Result<Self, ConfigError> {
        for (name, profile) in custom {
            let mut profile = profile.clone();
            profile.name = name.clone();
            profile.validate(registry)?;
            self.profiles.insert(name.clone(), profile);
        }
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&GradingProfile> {
        self.profiles.get(name)
    }

    pub fn resolve(&self, name: &str) -> Result<&GradingProfile, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GradingProfile> {
        self.profiles.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_reference_known_rules() {
        let registry = RuleRegistry::builtin();
        for profile in builtin_profiles() {
            profile.validate(&registry).expect("valid profile");
        }
    }

    #[test]
    fn test_enterprise_saas_requires_tenant_headers() {
        let saas = builtin_profile("enterprise-saas").expect("saas profile");
        assert!(saas.requires_multi_tenant_headers);
        assert!(saas.requires_authentication);
        assert!(saas.requires_api_id);
        let standard = builtin_profile("standard").expect("standard profile");
        assert!(!standard.requires_multi_tenant_headers);
    }

    #[test]
    fn test_custom_profile_from_toml() {
        let toml_str = r#"
            requires_api_id = false
            disabled_rules = ["EXC-003"]
        "#;
        let profile: GradingProfile = toml::from_str(toml_str).expect("parses");
        assert!(profile.requires_authentication);
        assert!(!profile.requires_api_id);

        let mut custom = BTreeMap::new();
        custom.insert("internal".to_string(), profile);
        let catalog = ProfileCatalog::builtin()
            .with_custom(&custom, &RuleRegistry::builtin())
            .expect("valid");
        let internal = catalog.resolve("internal").expect("registered");
        assert_eq!(internal.name, "internal");
        assert!(internal.is_rule_disabled("EXC-003"));
    }

    #[test]
    fn test_custom_profile_with_unknown_rule_is_rejected() {
        let mut custom = BTreeMap::new();
        custom.insert(
            "broken".to_string(),
            GradingProfile {
                custom_prerequisites: vec!["PREREQ-999".to_string()],
                ..Default::default()
            },
        );
        let err = ProfileCatalog::builtin()
            .with_custom(&custom, &RuleRegistry::builtin())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRule { .. }));
        assert!(matches!(
            ProfileCatalog::builtin().resolve("nope"),
            Err(ConfigError::UnknownProfile(_))
        ));
    }
}
