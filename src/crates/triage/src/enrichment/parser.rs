//! Enrichment response parsing.
//!
//! Completion backends are told to answer with JSON only, but in
//! practice prepend or append stray narrative text. Parsing therefore
//! locates the outermost `{...}` span and parses that; anything less
//! than a full schema-conforming object is a hard failure, never a
//! partial result.

use crate::enrichment::EnrichmentResult;
use thiserror::Error;

/// Errors produced while parsing a backend response.
#[derive(Debug, Error)]
pub enum ParseError {
    /// No `{...}` span found in the response.
    #[error("no JSON object found in response")]
    NoJsonObject,

    /// The extracted span is not valid JSON or does not match the
    /// enrichment schema.
    #[error("malformed enrichment JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Extract the outermost brace-delimited span from free text.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(text[start..=end].trim())
    } else {
        None
    }
}

/// Parse a raw backend response into an [`EnrichmentResult`].
///
/// Pure function, unit-testable independent of any network call.
/// Tag hygiene is applied separately by the engine.
pub fn parse_enrichment_response(raw: &str) -> Result<EnrichmentResult, ParseError> {
    let json = extract_json(raw).ok_or(ParseError::NoJsonObject)?;
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::{AffectedUsers, Priority, Severity};

    const VALID: &str = r#"{
        "summary": {
            "category": "bug",
            "severity": "low",
            "priority": "P3",
            "user_impact": "Minor visual glitch",
            "business_impact": "Negligible",
            "affected_users": "edge_cases",
            "technical_area": "frontend",
            "root_cause": "CSS z-index conflict",
            "reproducibility": "always",
            "recommended_action": "Fix stacking context",
            "confidence": 0.8
        },
        "tags": ["ui"]
    }"#;

    #[test]
    fn test_parse_bare_json() {
        let result = parse_enrichment_response(VALID).unwrap();
        assert_eq!(result.summary.severity, Severity::Low);
        assert_eq!(result.summary.priority, Priority::P3);
        assert_eq!(result.summary.affected_users, AffectedUsers::EdgeCases);
        assert_eq!(result.summary.root_cause.as_deref(), Some("CSS z-index conflict"));
        assert_eq!(result.tags, vec!["ui"]);
    }

    #[test]
    fn test_parse_with_surrounding_text() {
        let raw = format!("Here is my analysis:\n{VALID}\nLet me know if you need more!");
        let result = parse_enrichment_response(&raw).unwrap();
        assert_eq!(result.summary.category, "bug");
    }

    #[test]
    fn test_parse_with_code_fence() {
        let raw = format!("```json\n{VALID}\n```");
        let result = parse_enrichment_response(&raw).unwrap();
        assert_eq!(result.summary.severity, Severity::Low);
    }

    #[test]
    fn test_no_brace_span_fails() {
        let err = parse_enrichment_response("I cannot classify this.").unwrap_err();
        assert!(matches!(err, ParseError::NoJsonObject));
    }

    #[test]
    fn test_reversed_braces_fail() {
        let err = parse_enrichment_response("} nothing here {").unwrap_err();
        assert!(matches!(err, ParseError::NoJsonObject));
    }

    #[test]
    fn test_malformed_json_fails() {
        let err = parse_enrichment_response(r#"{"summary": {"#).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_schema_violation_fails() {
        // severity outside the fixed ordinal vocabulary
        let raw = r#"{"summary":{"category":"bug","severity":"catastrophic","priority":"P1"},"tags":[]}"#;
        let err = parse_enrichment_response(raw).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_custom_priority_rejected() {
        let raw = r#"{"summary":{"category":"bug","severity":"high","priority":"P9"},"tags":[]}"#;
        assert!(parse_enrichment_response(raw).is_err());
    }

    #[test]
    fn test_optional_fields_default() {
        let raw = r#"{"summary":{"category":"bug","severity":"high","priority":"P1"},"tags":[]}"#;
        let result = parse_enrichment_response(raw).unwrap();
        assert_eq!(result.summary.affected_users, AffectedUsers::Unknown);
        assert!(result.summary.root_cause.is_none());
        assert_eq!(result.summary.confidence, 0.0);
    }

    #[test]
    fn test_missing_tags_defaults_empty() {
        let raw = r#"{"summary":{"category":"bug","severity":"high","priority":"P1"}}"#;
        let result = parse_enrichment_response(raw).unwrap();
        assert!(result.tags.is_empty());
    }
}
