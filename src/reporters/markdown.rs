//! Markdown reporter for GitHub-flavored Markdown output
//!
//! Generates reports suitable for:
//! - Pull request comments
//! - API review checklists
//! - Documentation

use crate::checkpoints::CheckpointReport;
use crate::classifier::Classification;
use crate::grader::GradeComparison;
use crate::models::{Finding, Severity};
use crate::prerequisites::PrerequisiteResult;
use crate::scoring::GradeResult;
use chrono::Local;

/// Maximum findings to show per severity level
const MAX_FINDINGS_PER_SEVERITY: usize = 10;

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn generated() -> String {
    format!("Generated: {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"))
}

fn findings_by_severity(findings: &[Finding]) -> String {
    let mut md = String::from("## Findings\n\n");
    if findings.is_empty() {
        md.push_str("No findings.\n");
        return md;
    }
    for severity in &Severity::ALL {
        let group: Vec<&Finding> = findings.iter().filter(|f| f.severity == *severity).collect();
        if group.is_empty() {
            continue;
        }
        md.push_str(&format!("### {} ({})\n\n", severity, group.len()));
        md.push_str("| Rule | Location | Message | Fix |\n|------|----------|---------|-----|\n");
        for finding in group.iter().take(MAX_FINDINGS_PER_SEVERITY) {
            md.push_str(&format!(
                "| `{}` | `{}` | {} | {} |\n",
                finding.rule_id,
                finding.location,
                escape_cell(&finding.message),
                escape_cell(finding.fix_hint.as_deref().unwrap_or("")),
            ));
        }
        if group.len() > MAX_FINDINGS_PER_SEVERITY {
            md.push_str(&format!(
                "\n_...and {} more_\n",
                group.len() - MAX_FINDINGS_PER_SEVERITY
            ));
        }
        md.push('\n');
    }
    md
}

pub fn grade(result: &GradeResult) -> String {
    let mut md = String::from("# API Grade Report\n\n");
    if result.blocked {
        md.push_str(&format!(
            "**Grade: {}** | **Blocked by prerequisites**\n\n",
            result.letter_grade
        ));
        md.push_str(&generated());
        md.push('\n');
        md.push_str(&prerequisites(&result.prerequisites));
        return md;
    }

    md.push_str(&format!(
        "**Grade: {}** | **Score: {}/100** | **{}**\n\n",
        result.letter_grade,
        result.score,
        if result.passed { "Passed" } else { "Failed" }
    ));
    md.push_str(&generated());
    if let Some(profile) = &result.profile {
        md.push_str(&format!("\nProfile: `{profile}`\n"));
    }

    md.push_str("\n## Category Scores\n\n");
    md.push_str("| Category | Earned | Maximum | Percentage | Weight | Contribution |\n");
    md.push_str("|----------|--------|---------|------------|--------|--------------|\n");
    for category in &result.breakdown {
        md.push_str(&format!(
            "| {} | {:.1} | {:.1} | {:.0}% | {:.2} | {:.1} |\n",
            category.category,
            category.earned,
            category.maximum,
            category.percentage * 100.0,
            category.weight,
            category.weighted_score
        ));
    }

    let s = &result.summary;
    md.push_str(&format!(
        "\n## Summary\n\n| Severity | Count |\n|----------|-------|\n| Critical | {} |\n| High | {} |\n| Medium | {} |\n| Low | {} |\n| Info | {} |\n| **Total** | **{}** |\n\n",
        s.critical, s.high, s.medium, s.low, s.info, s.total
    ));
    md.push_str(&findings_by_severity(&result.findings));
    md
}

pub fn prerequisites(result: &PrerequisiteResult) -> String {
    let mut md = String::from("## Prerequisites\n\n");
    if result.passed {
        md.push_str(&format!("All {} prerequisites passed.\n", result.checked.len()));
    } else if let Some(reason) = &result.blocked_reason {
        md.push_str(&format!("> {reason}\n"));
    }
    if !result.skipped_prerequisites.is_empty() {
        md.push_str(&format!(
            "\nSkipped: {}\n",
            result
                .skipped_prerequisites
                .iter()
                .map(|id| format!("`{id}`"))
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    if !result.required_fixes.is_empty() {
        md.push_str("\n### Required fixes\n\n");
        for fix in &result.required_fixes {
            md.push_str(&format!("- [ ] {fix}\n"));
        }
    }
    if !result.failures.is_empty() {
        md.push('\n');
        md.push_str(&findings_by_severity(&result.failures));
    }
    md
}

pub fn checkpoints(report: &CheckpointReport) -> String {
    let mut md = String::from("# API Checkpoint Report\n\n");
    md.push_str(&format!(
        "**Grade: {}** | **Score: {}/{}** | **{}**\n\n",
        report.letter_grade,
        report.score,
        report.max_score,
        if report.passed { "Passed" } else { "Failed" }
    ));
    if report.clamped {
        md.push_str(&format!(
            "> Score clamped from {} by auto-fail checkpoints: {}\n\n",
            report.raw_score,
            report.auto_failures.join(", ")
        ));
    }
    md.push_str("| | Id | Category | Weight | Check | Detail |\n");
    md.push_str("|---|----|----------|--------|-------|--------|\n");
    for result in &report.results {
        let mark = match (result.passed, result.auto_fail) {
            (true, _) => "✅",
            (false, true) => "⛔",
            (false, false) => "❌",
        };
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            mark,
            result.id,
            result.category,
            result.weight,
            escape_cell(&result.description),
            escape_cell(&result.message)
        ));
    }
    md
}

pub fn classification(classification: &Classification) -> String {
    let mut md = String::from("# API Style Classification\n\n");
    md.push_str("| Style | Score | Evidence |\n|-------|-------|----------|\n");
    for score in &classification.scores {
        md.push_str(&format!(
            "| {} | {:.0} | {} |\n",
            score.style,
            score.score,
            escape_cell(&score.evidence.join("; "))
        ));
    }
    md.push_str(&format!(
        "\nSuggested profile: `{}`\n",
        classification.suggested_profile
    ));
    md
}

pub fn comparison(comparison: &GradeComparison) -> String {
    let mut md = String::from("# API Grade Comparison\n\n");
    md.push_str(&format!(
        "| | Score | Grade |\n|---|---|---|\n| Before | {} | {} |\n| After | {} | {} |\n| Delta | {:+} | |\n\n",
        comparison.before.score,
        comparison.before.letter_grade,
        comparison.after.score,
        comparison.after.letter_grade,
        comparison.score_delta
    ));
    md.push_str(&format!("## New findings ({})\n\n", comparison.new_findings.len()));
    for finding in &comparison.new_findings {
        md.push_str(&format!(
            "- `{}` {} (`{}`)\n",
            finding.rule_id, finding.message, finding.location
        ));
    }
    md.push_str(&format!("\n## Fixed findings ({})\n\n", comparison.fixed_findings.len()));
    for finding in &comparison.fixed_findings {
        md.push_str(&format!(
            "- `{}` {} (`{}`)\n",
            finding.rule_id, finding.message, finding.location
        ));
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::sample_grade;

    #[test]
    fn test_markdown_has_tables() {
        let result = sample_grade();
        let md = grade(&result);
        assert!(md.starts_with("# API Grade Report"));
        assert!(md.contains("## Category Scores"));
        assert!(md.contains("| Category | Earned |"));
        assert!(md.contains("## Findings"));
    }

    #[test]
    fn test_escape_cell() {
        assert_eq!(escape_cell("a|b\nc"), "a\\|b c");
    }
}
