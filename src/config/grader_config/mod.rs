//! Project-level configuration support
//!
//! Loads configuration from `apigrade.toml`, `.apigraderc.json`, or
//! `.apigrade.yaml` in a project directory.
//!
//! # Configuration Format
//!
//! ```toml
//! # apigrade.toml
//! profile = "enterprise-saas"   # or "auto" to use the classifier's suggestion
//!
//! [scoring]
//! passing_threshold = 75
//! category_weights = { functionality = 0.3, security = 0.3, scalability = 0.2, maintainability = 0.1, excellence = 0.1 }
//!
//! [rules.EXC-003]
//! enabled = false
//!
//! [rules.SEC-004]
//! severity = "critical"
//! points = 5
//!
//! [profiles.internal]
//! requires_api_id = false
//! disabled_rules = ["SCALE-002"]
//!
//! [[adjustments.overrides]]
//! rule_id = "MAINT-006"
//! cap = 1.0
//! reason = "versioning handled by the gateway"
//!
//! [defaults]
//! format = "text"
//! ```

use super::{ConfigError, RuleOverride};
use crate::profiles::GradingProfile;
use crate::scoring::{CategoryWeights, RuleInteraction, ScoreOverride, DEFAULT_PASSING_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Config file names, in search order
pub const CONFIG_FILE_NAMES: [&str; 4] = [
    "apigrade.toml",
    ".apigraderc.json",
    ".apigrade.yaml",
    ".apigrade.yml",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraderConfig {
    /// Profile name, or `auto`
    #[serde(default)]
    pub profile: Option<String>,

    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Per-rule overrides
    #[serde(default)]
    pub rules: BTreeMap<String, RuleOverride>,

    /// Custom grading profiles
    #[serde(default)]
    pub profiles: BTreeMap<String, GradingProfile>,

    #[serde(default)]
    pub adjustments: AdjustmentConfig,

    /// Default CLI flags
    #[serde(default)]
    pub defaults: CliDefaults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_passing_threshold")]
    pub passing_threshold: f64,

    /// Must sum to 1.0
    #[serde(default)]
    pub category_weights: CategoryWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            passing_threshold: default_passing_threshold(),
            category_weights: CategoryWeights::default(),
        }
    }
}

fn default_passing_threshold() -> f64 {
    DEFAULT_PASSING_THRESHOLD
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentConfig {
    /// Apply the built-in rule interactions
    #[serde(default = "default_true")]
    pub builtin_interactions: bool,

    /// Additional rule interactions
    #[serde(default)]
    pub interactions: Vec<RuleInteraction>,

    /// Externally supplied score overrides
    #[serde(default)]
    pub overrides: Vec<ScoreOverride>,
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            builtin_interactions: true,
            interactions: Vec::new(),
            overrides: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Default CLI flags that can be set in project config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliDefaults {
    /// Default output format (text, json, markdown)
    #[serde(default)]
    pub format: Option<String>,

    /// Exit non-zero when the grade does not pass
    #[serde(default)]
    pub fail_on_fail: Option<bool>,

    /// Evaluate rules in parallel
    #[serde(default)]
    pub parallel: Option<bool>,
}

impl GraderConfig {
    /// Checks that need no rule registry: weights and threshold
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.category_weights.validate()?;
        let threshold = self.scoring.passing_threshold;
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        Ok(())
    }
}

/// Load project configuration from a directory.
///
/// Searches for configuration files in this order:
/// 1. `apigrade.toml`
/// 2. `.apigraderc.json`
/// 3. `.apigrade.yaml` / `.apigrade.yml`
///
/// Returns the default configuration if no config file is found.
/// A file that exists but does not parse or validate is an error.
pub fn load_grader_config(dir: &Path) -> Result<GraderConfig, ConfigError> {
    for name in CONFIG_FILE_NAMES {
        let path = dir.join(name);
        if path.exists() {
            return load_config_file(&path);
        }
    }
    debug!("No config file in {}, using defaults", dir.display());
    Ok(GraderConfig::default())
}

/// Load one configuration file, choosing the format by extension
pub fn load_config_file(path: &Path) -> Result<GraderConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let config: GraderConfig = match extension.as_deref() {
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
        }
        _ => toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
    };

    config.validate()?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}
