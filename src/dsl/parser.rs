use serde_json::Value;
use tracing::{debug, warn};

use crate::dsl::cleaner::{clean_response, has_object_braces};
use crate::dsl::repair::repair_json;
use crate::error::FormgenError;

/// Where a model response ended up:
/// `Raw -> Cleaned -> NoObject | Strict | Repaired | Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// No `{ ... }` pair anywhere; never parsed, even if it is valid JSON.
    NoObject {
        cleaned: String,
    },
    Strict {
        cleaned: String,
        value: Value,
    },
    Repaired {
        cleaned: String,
        repaired: String,
        value: Value,
    },
    Failed {
        cleaned: String,
        repaired: String,
        message: String,
    },
}

/// A response that reached a JSON value, with the text it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub value: Value,
    pub cleaned_text: String,
    pub repaired_text: Option<String>,
}

pub fn parse_response(raw: &str) -> ParseOutcome {
    let cleaned = clean_response(raw);
    if !has_object_braces(&cleaned) {
        debug!("model response holds no JSON object");
        return ParseOutcome::NoObject { cleaned };
    }
    let strict_error = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => return ParseOutcome::Strict { cleaned, value },
        Err(err) => err,
    };
    debug!(error = %strict_error, "strict parse failed, attempting repair");

    let repaired = repair_json(&cleaned);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => ParseOutcome::Repaired {
            cleaned,
            repaired,
            value,
        },
        Err(err) => {
            let snippet: String = repaired.chars().take(100).collect();
            warn!(error = %err, snippet = %snippet, "repaired text still fails strict parse");
            ParseOutcome::Failed {
                cleaned,
                repaired,
                message: err.to_string(),
            }
        }
    }
}

impl ParseOutcome {
    pub fn cleaned(&self) -> &str {
        match self {
            ParseOutcome::NoObject { cleaned }
            | ParseOutcome::Strict { cleaned, .. }
            | ParseOutcome::Repaired { cleaned, .. }
            | ParseOutcome::Failed { cleaned, .. } => cleaned,
        }
    }

    pub fn is_repaired(&self) -> bool {
        matches!(self, ParseOutcome::Repaired { .. })
    }

    /// Converts the terminal state into the pipeline's result, keeping the
    /// raw text for diagnostics on failure.
    pub fn into_result(self, raw: &str) -> Result<ParsedResponse, FormgenError> {
        match self {
            ParseOutcome::NoObject { .. } => Err(FormgenError::NoJsonFound {
                raw_text: raw.to_string(),
            }),
            ParseOutcome::Strict { cleaned, value } => Ok(ParsedResponse {
                value,
                cleaned_text: cleaned,
                repaired_text: None,
            }),
            ParseOutcome::Repaired {
                cleaned,
                repaired,
                value,
            } => Ok(ParsedResponse {
                value,
                cleaned_text: cleaned,
                repaired_text: Some(repaired),
            }),
            ParseOutcome::Failed { cleaned, message, .. } => Err(FormgenError::SchemaGenerationFailed {
                raw_text: raw.to_string(),
                cleaned_text: cleaned,
                message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_json_parses_strictly() {
        let outcome = parse_response("```json\n{\"title\": \"T\"}\n```");
        assert_eq!(
            outcome,
            ParseOutcome::Strict {
                cleaned: "{\"title\": \"T\"}".into(),
                value: json!({"title": "T"}),
            }
        );
    }

    #[test]
    fn broken_json_is_repaired() {
        let outcome = parse_response(r#"{"title": "T", "fields": [],}"#);
        assert!(outcome.is_repaired());
        let parsed = outcome.into_result("ignored").unwrap();
        assert_eq!(parsed.value, json!({"title": "T", "fields": []}));
        assert_eq!(parsed.repaired_text.as_deref(), Some(r#"{"title": "T", "fields": []}"#));
    }

    #[test]
    fn unrepairable_json_fails_with_diagnostics() {
        let raw = "Result: {\"title\": \"T\" \"fields\": }";
        let err = parse_response(raw).into_result(raw).unwrap_err();
        match err {
            FormgenError::SchemaGenerationFailed {
                raw_text,
                cleaned_text,
                message,
            } => {
                assert_eq!(raw_text, raw);
                assert_eq!(cleaned_text, "{\"title\": \"T\" \"fields\": }");
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn response_without_braces_reports_no_json() {
        let raw = "Sorry, I can't produce that form.";
        let outcome = parse_response(raw);
        assert_eq!(outcome.cleaned(), raw);
        match outcome.into_result(raw) {
            Err(FormgenError::NoJsonFound { raw_text }) => assert_eq!(raw_text, raw),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn valid_json_without_an_object_is_not_trusted() {
        for raw in ["\"Sorry, I cannot build that form.\"", "null", "42", "[]", "true"] {
            let outcome = parse_response(raw);
            assert!(matches!(outcome, ParseOutcome::NoObject { .. }), "{raw} -> {outcome:?}");
            assert!(matches!(outcome.into_result(raw), Err(FormgenError::NoJsonFound { .. })));
        }
    }
}
