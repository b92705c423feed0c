//! JSON reporter
//!
//! Outputs results as pretty-printed JSON.
//! Useful for machine consumption, piping to jq, or further processing.

use anyhow::Result;
use serde::Serialize;

/// Render any result as JSON
pub fn render<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::sample_grade;

    #[test]
    fn test_json_render_valid() {
        let result = sample_grade();
        let json_str = render(&result).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("parse JSON");
        assert_eq!(parsed["score"], u64::from(result.score));
        assert_eq!(parsed["letter_grade"], result.letter_grade.as_str());
        assert!(!parsed["findings"].as_array().expect("findings array").is_empty());
    }

    #[test]
    fn test_json_exposes_gate_outcome() {
        let result = sample_grade();
        let parsed: serde_json::Value =
            serde_json::from_str(&render(&result).expect("render JSON")).expect("parse JSON");
        assert_eq!(parsed["blocked"], false);
        assert_eq!(parsed["prerequisites"]["passed"], true);
        assert_eq!(parsed["breakdown"].as_array().expect("breakdown").len(), 5);
    }
}
