//! Grade, check, classify, checkpoints and compare commands

use super::input::load_document;
use super::{configured_builder, write_output};
use crate::checkpoints::run_checkpoints as run_builtin_checkpoints;
use crate::config::GraderConfig;
use crate::grader::{GraderOptions, ProgressCallback};
use crate::reporters::{
    render_checkpoints, render_classification, render_comparison, render_grade,
    render_prerequisites, OutputFormat,
};
use anyhow::{Context, Result};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub(super) struct GradeArgs {
    pub file: PathBuf,
    pub profile: Option<String>,
    pub threshold: Option<f64>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub fail_on_fail: bool,
    pub sequential: bool,
}

/// Stage spinner on stderr, only when stderr is a terminal
fn stage_spinner() -> Option<ProgressBar> {
    if !Term::stderr().is_term() {
        return None;
    }
    let spinner = ProgressBar::new_spinner();
    let spinner_style = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(spinner_style);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Some(spinner)
}

fn spinner_callback(spinner: ProgressBar) -> ProgressCallback {
    Box::new(move |stage, percent, note| {
        let message = match note {
            Some(note) => format!("{stage} {percent}% ({note})"),
            None => format!("{stage} {percent}%"),
        };
        spinner.set_message(message);
        Ok(())
    })
}

pub(super) fn run_grade(config: &GraderConfig, args: GradeArgs) -> Result<()> {
    let doc = load_document(&args.file)?;

    let mut builder = configured_builder(config, args.profile.as_deref(), args.threshold)?;
    if args.sequential {
        builder = builder.options(GraderOptions { parallel: false });
    }
    let spinner = stage_spinner();
    if let Some(spinner) = &spinner {
        builder = builder.on_progress(spinner_callback(spinner.clone()));
    }
    let grader = builder.build().context("Invalid grader configuration")?;

    let result = grader.grade(&doc);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    info!(
        "Graded {}: {} ({}) with {} findings",
        args.file.display(),
        result.score,
        result.letter_grade,
        result.findings.len()
    );

    let rendered = render_grade(&result, args.format)?;
    write_output(&rendered, args.output.as_deref())?;

    if args.fail_on_fail && !result.passed {
        eprintln!(
            "\n{} Grade {} ({}/100) is below the passing threshold of {:.0}",
            style("✗").red(),
            result.letter_grade,
            result.score,
            result.passing_threshold
        );
        std::process::exit(1);
    }
    Ok(())
}

pub(super) fn run_check(
    config: &GraderConfig,
    file: &Path,
    profile: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let doc = load_document(file)?;
    let grader = configured_builder(config, profile, None)?
        .build()
        .context("Invalid grader configuration")?;

    let result = grader.check_prerequisites(&doc);
    write_output(&render_prerequisites(&result, format)?, None)?;
    if !result.passed {
        std::process::exit(1);
    }
    Ok(())
}

pub(super) fn run_classify(config: &GraderConfig, file: &Path, format: OutputFormat) -> Result<()> {
    let doc = load_document(file)?;
    let grader = configured_builder(config, None, None)?
        .build()
        .context("Invalid grader configuration")?;
    write_output(&render_classification(&grader.classify(&doc), format)?, None)
}

pub(super) fn run_checkpoints(file: &Path, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let doc = load_document(file)?;
    let report = run_builtin_checkpoints(&doc);
    info!(
        "Checkpoints for {}: {}/{} ({} failing)",
        file.display(),
        report.score,
        report.max_score,
        report.failures().count()
    );
    write_output(&render_checkpoints(&report, format)?, output)
}

pub(super) fn run_compare(
    config: &GraderConfig,
    old: &Path,
    new: &Path,
    profile: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let before = load_document(old)?;
    let after = load_document(new)?;
    let grader = configured_builder(config, profile, None)?
        .build()
        .context("Invalid grader configuration")?;
    write_output(&render_comparison(&grader.compare(&before, &after), format)?, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoints_command_writes_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = dir.path().join("api.json");
        std::fs::write(&doc, include_str!("../../tests/fixtures/best_practice.json")).expect("write doc");
        let out = dir.path().join("checkpoints.json");

        run_checkpoints(&doc, OutputFormat::Json, Some(&out)).expect("checkpoints run");

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).expect("report written")).expect("json");
        assert_eq!(report["results"].as_array().expect("results").len(), 73);
        assert_eq!(report["max_score"], 100);
    }
}
