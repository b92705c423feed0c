//! Text (terminal) reporter with colors and formatting

use crate::checkpoints::CheckpointReport;
use crate::classifier::Classification;
use crate::grader::GradeComparison;
use crate::models::{Finding, FindingsSummary, Severity};
use crate::prerequisites::PrerequisiteResult;
use crate::scoring::{GradeResult, LetterGrade};
use console::{style, StyledObject};

/// Findings listed before "...and N more"
const MAX_LISTED: usize = 15;

const RULE: &str = "──────────────────────────────────────";

fn styled_grade(grade: LetterGrade) -> StyledObject<&'static str> {
    let label = style(grade.as_str()).bold();
    match grade.as_str().chars().next() {
        Some('A') => label.green(),
        Some('B') => label.cyan(),
        Some('C') => label.yellow(),
        Some('D') => label.magenta(),
        _ => label.red(),
    }
}

fn severity_tag(severity: Severity) -> StyledObject<&'static str> {
    match severity {
        Severity::Critical => style("[C]").red().bold(),
        Severity::High => style("[H]").red(),
        Severity::Medium => style("[M]").yellow(),
        Severity::Low => style("[L]").blue(),
        Severity::Info => style("[I]").dim(),
    }
}

fn format_percent(pct: f64) -> String {
    let text = format!("{:>3.0}%", pct * 100.0);
    let styled = if pct >= 0.8 {
        style(text).green()
    } else if pct >= 0.6 {
        style(text).yellow()
    } else {
        style(text).red()
    };
    styled.to_string()
}

fn summary_line(summary: &FindingsSummary) -> String {
    let mut parts = Vec::new();
    if summary.critical > 0 {
        parts.push(style(format!("{} critical", summary.critical)).red().bold().to_string());
    }
    if summary.high > 0 {
        parts.push(style(format!("{} high", summary.high)).red().to_string());
    }
    if summary.medium > 0 {
        parts.push(style(format!("{} medium", summary.medium)).yellow().to_string());
    }
    if summary.low > 0 {
        parts.push(style(format!("{} low", summary.low)).blue().to_string());
    }
    if summary.info > 0 {
        parts.push(style(format!("{} info", summary.info)).dim().to_string());
    }
    parts.join(" | ")
}

fn push_findings(out: &mut String, findings: &[Finding]) {
    for finding in findings.iter().take(MAX_LISTED) {
        out.push_str(&format!(
            "  {} {:<14} {}\n",
            severity_tag(finding.severity),
            finding.rule_id,
            finding.message
        ));
        out.push_str(&format!("      {}\n", style(&finding.location).dim()));
        if let Some(hint) = &finding.fix_hint {
            out.push_str(&format!("      {} {}\n", style("fix:").cyan(), hint));
        }
    }
    let remaining = findings.len().saturating_sub(MAX_LISTED);
    if remaining > 0 {
        out.push_str(&format!(
            "  {}\n",
            style(format!("...and {remaining} more (use --format json for the full list)")).dim()
        ));
    }
}

fn header(out: &mut String, title: &str) {
    out.push_str(&format!("\n{}\n", style(title).bold()));
    out.push_str(&format!("{}\n", style(RULE).dim()));
}

pub fn grade(result: &GradeResult) -> String {
    let mut out = String::new();
    header(&mut out, "apigrade");

    if result.blocked {
        out.push_str(&format!(
            "Grade: {}  {}\n",
            styled_grade(result.letter_grade),
            style("BLOCKED by prerequisites").red().bold()
        ));
        out.push_str(&prerequisites(&result.prerequisites));
        return out;
    }

    let verdict = if result.passed {
        style("PASS").green().bold()
    } else {
        style("FAIL").red().bold()
    };
    out.push_str(&format!(
        "Score: {}  Grade: {}  {}  {}\n",
        style(format!("{}/100", result.score)).bold(),
        styled_grade(result.letter_grade),
        verdict,
        style(format!("(threshold {:.0})", result.passing_threshold)).dim()
    ));
    if let Some(profile) = &result.profile {
        out.push_str(&format!("Profile: {profile}\n"));
    }
    if result.excellence {
        out.push_str(&format!("{}\n", style("Excellence threshold reached").green()));
    }

    out.push_str(&format!("\n{}\n", style("CATEGORIES").bold()));
    for category in &result.breakdown {
        out.push_str(&format!(
            "  {:<16} {}  {:>5.1}/{:<5.1} {}\n",
            category.category.as_str(),
            format_percent(category.percentage),
            category.earned,
            category.maximum,
            style(format!("x{:.2} = {:.1}", category.weight, category.weighted_score)).dim()
        ));
    }

    out.push_str(&format!(
        "\n{} ({} total)\n",
        style("FINDINGS").bold(),
        result.summary.total
    ));
    let line = summary_line(&result.summary);
    if !line.is_empty() {
        out.push_str(&format!("  {line}\n"));
    }
    push_findings(&mut out, &result.findings);
    out
}

pub fn prerequisites(result: &PrerequisiteResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", style("PREREQUISITES").bold()));
    if result.passed {
        out.push_str(&format!(
            "  {} {} checks passed\n",
            style("✓").green(),
            result.checked.len()
        ));
    } else if let Some(reason) = &result.blocked_reason {
        out.push_str(&format!("  {} {}\n", style("✗").red(), reason));
    }
    if !result.skipped_prerequisites.is_empty() {
        out.push_str(&format!(
            "  {}\n",
            style(format!("skipped: {}", result.skipped_prerequisites.join(", "))).dim()
        ));
    }
    push_findings(&mut out, &result.failures);
    if !result.required_fixes.is_empty() {
        out.push_str(&format!("\n{}\n", style("REQUIRED FIXES").bold()));
        for (i, fix) in result.required_fixes.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
    }
    out
}

pub fn checkpoints(report: &CheckpointReport) -> String {
    let mut out = String::new();
    header(&mut out, "apigrade checkpoints");
    out.push_str(&format!(
        "Score: {}  Grade: {}  {}\n",
        style(format!("{}/{}", report.score, report.max_score)).bold(),
        styled_grade(report.letter_grade),
        if report.passed {
            style("PASS").green().bold()
        } else {
            style("FAIL").red().bold()
        }
    ));
    if report.clamped {
        out.push_str(&format!(
            "{}\n",
            style(format!(
                "Clamped from {} by auto-fail checkpoints: {}",
                report.raw_score,
                report.auto_failures.join(", ")
            ))
            .red()
        ));
    }

    let failures: Vec<_> = report.failures().collect();
    out.push_str(&format!(
        "\n{} ({} of {} failing)\n",
        style("FAILED CHECKPOINTS").bold(),
        failures.len(),
        report.results.len()
    ));
    for result in failures {
        let marker = if result.auto_fail {
            style("!").red().bold()
        } else {
            style("✗").red()
        };
        out.push_str(&format!(
            "  {} {:<9} {:<2} {}\n      {}\n",
            marker,
            result.id,
            result.weight,
            result.description,
            style(&result.message).dim()
        ));
    }
    out
}

pub fn classification(classification: &Classification) -> String {
    let mut out = String::new();
    header(&mut out, "apigrade classify");
    for score in &classification.scores {
        let primary = classification.primary == Some(score.style);
        let name = if primary {
            style(score.style.to_string()).bold().green()
        } else {
            style(score.style.to_string()).bold()
        };
        out.push_str(&format!("{name}  {:.0}/100\n", score.score));
        for line in &score.evidence {
            out.push_str(&format!("  {} {}\n", style("•").dim(), line));
        }
    }
    out.push_str(&format!(
        "\nSuggested profile: {}\n",
        style(&classification.suggested_profile).cyan().bold()
    ));
    out
}

pub fn comparison(comparison: &GradeComparison) -> String {
    let mut out = String::new();
    header(&mut out, "apigrade compare");
    let delta = format!("{:+}", comparison.score_delta);
    let delta = if comparison.improved() {
        style(delta).green().bold()
    } else if comparison.regressed() {
        style(delta).red().bold()
    } else {
        style(delta).dim()
    };
    out.push_str(&format!(
        "Score: {} ({}) → {} ({})  {}\n",
        comparison.before.score,
        styled_grade(comparison.before.letter_grade),
        comparison.after.score,
        styled_grade(comparison.after.letter_grade),
        delta
    ));
    out.push_str(&format!(
        "\n{} ({})\n",
        style("NEW FINDINGS").bold(),
        comparison.new_findings.len()
    ));
    push_findings(&mut out, &comparison.new_findings);
    out.push_str(&format!(
        "\n{} ({})\n",
        style("FIXED FINDINGS").bold(),
        comparison.fixed_findings.len()
    ));
    push_findings(&mut out, &comparison.fixed_findings);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoints::run_checkpoints;
    use crate::reporters::tests::{sample_document, sample_grade};
    use console::strip_ansi_codes;

    #[test]
    fn test_grade_text_lists_categories() {
        let result = sample_grade();
        let out = strip_ansi_codes(&grade(&result)).to_string();
        assert!(out.contains(&format!("Score: {}/100", result.score)));
        for category in ["functionality", "security", "scalability", "maintainability", "excellence"] {
            assert!(out.contains(category), "missing {category}");
        }
    }

    #[test]
    fn test_checkpoint_text_reports_clamp() {
        let report = run_checkpoints(&sample_document());
        let out = strip_ansi_codes(&checkpoints(&report)).to_string();
        assert!(out.contains("FAILED CHECKPOINTS"));
        if report.clamped {
            assert!(out.contains("Clamped from"));
        }
    }
}
