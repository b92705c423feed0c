//! Init command - write an example apigrade.toml

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

const EXAMPLE_CONFIG: &str = r#"# apigrade configuration
# Every key is optional; the values below are the defaults unless noted.

# Grading profile: standard, rest, grpc, enterprise-saas, or "auto"
# to follow the classifier's suggestion. Omit to use the fixed gate.
# profile = "auto"

[scoring]
passing_threshold = 70

[scoring.category_weights]
functionality = 0.30
security = 0.25
scalability = 0.20
maintainability = 0.15
excellence = 0.10

# Disable or re-weight individual rules
# [rules.EXC-003]
# enabled = false
#
# [rules.SEC-004]
# severity = "critical"
# points = 5

# Custom profiles
# [profiles.partner]
# description = "Partner-facing APIs"
# requires_api_id = true
# requires_multi_tenant_headers = false
# disabled_rules = ["SCALE-004"]

[adjustments]
builtin_interactions = true

[defaults]
# Output format (text, json, markdown)
format = "text"
# Exit with status 1 when the grade does not pass
fail_on_fail = false
parallel = true
"#;

/// Run the init command
pub fn run(dir: &Path, force: bool) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Path is not a directory: {}", dir.display());
    }

    let config_path = dir.join("apigrade.toml");
    if config_path.exists() && !force {
        println!(
            "{} {} already exists (use --force to overwrite)",
            style("!").yellow(),
            style(config_path.display()).cyan()
        );
        return Ok(());
    }

    std::fs::write(&config_path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!(
        "{} Created {}",
        style("✓").green(),
        style(config_path.display()).cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_grader_config;
    use tempfile::TempDir;

    #[test]
    fn test_example_config_loads() {
        let dir = TempDir::new().expect("tempdir");
        run(dir.path(), false).expect("init");
        let config = load_grader_config(dir.path()).expect("example config is valid");
        assert_eq!(config.defaults.format.as_deref(), Some("text"));
        assert!(config.adjustments.builtin_interactions);
    }

    #[test]
    fn test_existing_config_kept() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("apigrade.toml");
        std::fs::write(&path, "profile = \"grpc\"\n").expect("write");
        run(dir.path(), false).expect("init");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "profile = \"grpc\"\n");
    }
}
