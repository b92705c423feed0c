//! CLI command definitions and handlers

mod grade;
mod init;
pub mod input;
mod rules;

use crate::config::{load_config_file, load_grader_config, GraderConfig};
use crate::grader::{GraderBuilder, GraderOptions, ProfileSelection};
use crate::reporters::OutputFormat;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Parse and validate a passing threshold (0-100)
fn parse_threshold(s: &str) -> Result<f64, String> {
    let n: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if !(0.0..=100.0).contains(&n) {
        Err("threshold must be between 0 and 100".to_string())
    } else {
        Ok(n)
    }
}

/// apigrade - Grade OpenAPI descriptions against API design rules
#[derive(Parser, Debug)]
#[command(name = "apigrade")]
#[command(
    version,
    about = "Grade OpenAPI descriptions: prerequisite gate, weighted rule coverage, style classification and letter grades",
    after_help = "\
Examples:
  apigrade grade openapi.yaml                      Grade a document
  apigrade grade openapi.json --format json        JSON output for scripting
  apigrade grade api.yaml --profile auto           Pick the profile from the detected API style
  apigrade grade api.yaml --fail-on-fail           Exit code 1 below the passing threshold (CI mode)
  apigrade check api.yaml --profile enterprise-saas  Run only the prerequisite gate
  apigrade checkpoints api.yaml                    73-point checklist with auto-fail clamp
  apigrade compare old.yaml new.yaml               New and fixed findings between versions"
)]
pub struct Cli {
    /// Config file (default: apigrade.toml, .apigraderc.json or .apigrade.yaml in the current directory)
    #[arg(long, global = true, env = "APIGRADE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Grade a document: prerequisites, rule scores, letter grade
    Grade {
        /// OpenAPI document (JSON or YAML)
        file: PathBuf,

        /// Grading profile name, or "auto"
        #[arg(long, short = 'p')]
        profile: Option<String>,

        /// Minimum score to pass (0-100)
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,

        /// Output format: text, json, markdown (or md)
        #[arg(long, short = 'f', value_parser = ["text", "json", "markdown", "md"])]
        format: Option<String>,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Exit with code 1 when the grade does not pass
        #[arg(long)]
        fail_on_fail: bool,

        /// Evaluate rules on the current thread
        #[arg(long)]
        sequential: bool,
    },

    /// Run only the prerequisite gate (exit code 1 when blocked)
    Check {
        file: PathBuf,

        #[arg(long, short = 'p')]
        profile: Option<String>,

        #[arg(long, short = 'f', value_parser = ["text", "json", "markdown", "md"])]
        format: Option<String>,
    },

    /// Detect the API style and suggest a profile
    Classify {
        file: PathBuf,

        #[arg(long, short = 'f', value_parser = ["text", "json", "markdown", "md"])]
        format: Option<String>,
    },

    /// Run the weighted checkpoint checklist
    Checkpoints {
        file: PathBuf,

        #[arg(long, short = 'f', value_parser = ["text", "json", "markdown", "md"])]
        format: Option<String>,

        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Grade two versions of a document and diff their findings
    Compare {
        /// Baseline document
        old: PathBuf,

        /// Changed document
        new: PathBuf,

        #[arg(long, short = 'p')]
        profile: Option<String>,

        #[arg(long, short = 'f', value_parser = ["text", "json", "markdown", "md"])]
        format: Option<String>,
    },

    /// List the active rules after config overrides
    Rules {
        /// Only rules in this category
        #[arg(long)]
        category: Option<String>,

        #[arg(long, short = 'f', value_parser = ["text", "json", "markdown", "md"])]
        format: Option<String>,
    },

    /// Write an example apigrade.toml
    Init {
        /// Directory to write into
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing apigrade.toml
        #[arg(long)]
        force: bool,
    },
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    if let Commands::Init { path, force } = &cli.command {
        return init::run(path, *force);
    }

    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Grade {
            file,
            profile,
            threshold,
            format,
            output,
            fail_on_fail,
            sequential,
        } => grade::run_grade(
            &config,
            grade::GradeArgs {
                file,
                profile,
                threshold,
                format: resolve_format(format.as_deref(), &config)?,
                output,
                fail_on_fail: fail_on_fail || config.defaults.fail_on_fail.unwrap_or(false),
                sequential,
            },
        ),
        Commands::Check {
            file,
            profile,
            format,
        } => grade::run_check(
            &config,
            &file,
            profile.as_deref(),
            resolve_format(format.as_deref(), &config)?,
        ),
        Commands::Classify { file, format } => {
            grade::run_classify(&config, &file, resolve_format(format.as_deref(), &config)?)
        }
        Commands::Checkpoints {
            file,
            format,
            output,
        } => grade::run_checkpoints(
            &file,
            resolve_format(format.as_deref(), &config)?,
            output.as_deref(),
        ),
        Commands::Compare {
            old,
            new,
            profile,
            format,
        } => grade::run_compare(
            &config,
            &old,
            &new,
            profile.as_deref(),
            resolve_format(format.as_deref(), &config)?,
        ),
        Commands::Rules { category, format } => rules::run(
            &config,
            category.as_deref(),
            resolve_format(format.as_deref(), &config)?,
        ),
        Commands::Init { .. } => Ok(()),
    }
}

/// Explicit `--config` wins; otherwise search the current directory
fn load_config(path: Option<&Path>) -> Result<GraderConfig> {
    match path {
        Some(path) => load_config_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => load_grader_config(Path::new(".")).context("Failed to load apigrade config"),
    }
}

/// CLI flag, then `[defaults] format`, then text
fn resolve_format(flag: Option<&str>, config: &GraderConfig) -> Result<OutputFormat> {
    match flag.or(config.defaults.format.as_deref()) {
        Some(name) => name.parse(),
        None => Ok(OutputFormat::default()),
    }
}

/// Grader builder from config with CLI overrides applied
fn configured_builder(
    config: &GraderConfig,
    profile: Option<&str>,
    threshold: Option<f64>,
) -> Result<GraderBuilder> {
    let mut builder = GraderBuilder::from_config(config).context("Invalid apigrade config")?;
    if let Some(name) = profile {
        builder = builder.profile(ProfileSelection::from_name(Some(name)));
    }
    if let Some(threshold) = threshold {
        builder = builder.passing_threshold(threshold);
    }
    if config.defaults.parallel == Some(false) {
        builder = builder.options(GraderOptions { parallel: false });
    }
    Ok(builder)
}

/// Print to stdout, or write to a file when `--output` is given
fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Report written to: {}", path.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold("75"), Ok(75.0));
        assert!(parse_threshold("101").is_err());
        assert!(parse_threshold("abc").is_err());
    }

    #[test]
    fn test_format_resolution_order() {
        let mut config = GraderConfig::default();
        assert_eq!(resolve_format(None, &config).expect("default"), OutputFormat::Text);
        config.defaults.format = Some("json".to_string());
        assert_eq!(resolve_format(None, &config).expect("config"), OutputFormat::Json);
        assert_eq!(
            resolve_format(Some("md"), &config).expect("flag"),
            OutputFormat::Markdown
        );
        config.defaults.format = Some("sarif".to_string());
        assert!(resolve_format(None, &config).is_err());
    }

    #[test]
    fn test_cli_parses_grade() {
        let cli = Cli::try_parse_from([
            "apigrade",
            "grade",
            "api.yaml",
            "--profile",
            "auto",
            "--threshold",
            "80",
            "-f",
            "json",
        ])
        .expect("parse");
        match cli.command {
            Commands::Grade {
                profile,
                threshold,
                format,
                ..
            } => {
                assert_eq!(profile.as_deref(), Some("auto"));
                assert_eq!(threshold, Some(80.0));
                assert_eq!(format.as_deref(), Some("json"));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_cli_threshold_override() {
        let grader = configured_builder(&GraderConfig::default(), Some("grpc"), Some(85.0))
            .expect("builder")
            .build()
            .expect("grader");
        assert_eq!(grader.calculator().passing_threshold(), 85.0);
        assert_eq!(
            grader.selection(),
            &ProfileSelection::Named("grpc".to_string())
        );
    }
}
