//! Output reporters for apigrade results
//!
//! Supports multiple output formats:
//! - `text` - Terminal output with colors
//! - `json` - Machine-readable JSON
//! - `markdown` - GitHub-flavored Markdown (PR comments, wikis)

mod json;
mod markdown;
mod text;

use crate::checkpoints::CheckpointReport;
use crate::classifier::Classification;
use crate::grader::GradeComparison;
use crate::prerequisites::PrerequisiteResult;
use crate::scoring::GradeResult;
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(anyhow!(
                "Unknown format '{}'. Valid formats: text, json, markdown",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

pub fn render_grade(result: &GradeResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::grade(result)),
        OutputFormat::Json => json::render(result),
        OutputFormat::Markdown => Ok(markdown::grade(result)),
    }
}

pub fn render_prerequisites(result: &PrerequisiteResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::prerequisites(result)),
        OutputFormat::Json => json::render(result),
        OutputFormat::Markdown => Ok(markdown::prerequisites(result)),
    }
}

pub fn render_checkpoints(report: &CheckpointReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::checkpoints(report)),
        OutputFormat::Json => json::render(report),
        OutputFormat::Markdown => Ok(markdown::checkpoints(report)),
    }
}

pub fn render_classification(
    classification: &Classification,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::classification(classification)),
        OutputFormat::Json => json::render(classification),
        OutputFormat::Markdown => Ok(markdown::classification(classification)),
    }
}

pub fn render_comparison(comparison: &GradeComparison, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::comparison(comparison)),
        OutputFormat::Json => json::render(comparison),
        OutputFormat::Markdown => Ok(markdown::comparison(comparison)),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::document::Document;
    use crate::grader::Grader;
    use serde_json::json;

    /// A small document that clears the fixed gate but misses most rules
    pub(crate) fn sample_document() -> Document {
        Document::new(json!({
            "openapi": "3.0.3",
            "info": {"title": "Orders", "version": "1.0.0", "x-api-id": "acct_1699999999999_deadbeefcafebabe"},
            "servers": [{"url": "https://api.example.com/v1"}],
            "components": {"securitySchemes": {"bearer": {"type": "http", "scheme": "bearer"}}},
            "security": [{"bearer": []}],
            "paths": {"/orders": {
                "parameters": [{"name": "X-Organization-ID", "in": "header", "required": true}],
                "get": {"responses": {"200": {"description": "ok"}}}
            }}
        }))
    }

    pub(crate) fn sample_grade() -> GradeResult {
        Grader::default().grade(&sample_document())
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("md".parse::<OutputFormat>().expect("md"), OutputFormat::Markdown);
        assert_eq!("JSON".parse::<OutputFormat>().expect("json"), OutputFormat::Json);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_every_format_renders_a_grade() {
        let result = sample_grade();
        for format in [OutputFormat::Text, OutputFormat::Json, OutputFormat::Markdown] {
            let out = render_grade(&result, format).expect("render");
            assert!(out.contains(result.letter_grade.as_str()), "{format}");
        }
    }
}
