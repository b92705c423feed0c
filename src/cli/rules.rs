//! Rules command - list the active rule catalog

use super::{configured_builder, write_output};
use crate::config::GraderConfig;
use crate::models::Category;
use crate::reporters::OutputFormat;
use crate::rules::Rule;
use anyhow::{anyhow, Context, Result};
use console::style;
use serde_json::json;

pub(super) fn run(config: &GraderConfig, category: Option<&str>, format: OutputFormat) -> Result<()> {
    let category: Option<Category> = category
        .map(|name| name.parse().map_err(|e: String| anyhow!(e)))
        .transpose()?;
    let grader = configured_builder(config, None, None)?
        .build()
        .context("Invalid grader configuration")?;

    let rules: Vec<&Rule> = grader
        .registry()
        .rules()
        .iter()
        .filter(|rule| category.map_or(true, |c| rule.category == c))
        .collect();
    write_output(&render(&rules, format)?, None)
}

fn render(rules: &[&Rule], format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => {
            let listed: Vec<_> = rules
                .iter()
                .map(|rule| {
                    json!({
                        "id": rule.id,
                        "name": rule.name,
                        "category": rule.category,
                        "severity": rule.severity,
                        "points": rule.points,
                        "effort": rule.effort,
                        "description": rule.description,
                    })
                })
                .collect();
            serde_json::to_string_pretty(&listed)?
        }
        OutputFormat::Markdown => {
            let mut md = String::from("| Id | Name | Category | Severity | Points |\n");
            md.push_str("|----|------|----------|----------|--------|\n");
            for rule in rules {
                md.push_str(&format!(
                    "| `{}` | {} | {} | {} | {} |\n",
                    rule.id, rule.name, rule.category, rule.severity, rule.points
                ));
            }
            md
        }
        OutputFormat::Text => {
            let mut out = String::new();
            let mut current = None;
            for rule in rules {
                if current != Some(rule.category) {
                    current = Some(rule.category);
                    out.push_str(&format!("\n{}\n", style(rule.category.as_str().to_uppercase()).bold()));
                }
                out.push_str(&format!(
                    "  {:<20} {:>4}  {:<8} {}\n",
                    rule.id,
                    rule.points,
                    rule.severity,
                    style(rule.name).dim()
                ));
            }
            out.push_str(&format!("\n{} rules\n", rules.len()));
            out
        }
    })
}
