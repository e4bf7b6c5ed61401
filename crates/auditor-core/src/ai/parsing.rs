//! JSON parsing helpers for AI backend responses
//!
//! Models often wrap their JSON in prose or Markdown fences, so the audit
//! parser looks for the outermost `{...}` span.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::AuditDocument;

/// Longest raw excerpt included in error messages
const RAW_EXCERPT_CHARS: usize = 200;

fn excerpt(text: &str) -> String {
    if text.chars().count() > RAW_EXCERPT_CHARS {
        let cut: String = text.chars().take(RAW_EXCERPT_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Extract the outermost JSON object from a model response
pub fn extract_json_object(response: &str) -> Result<Value> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            let value: Value = serde_json::from_str(json_str).map_err(|e| {
                Error::Ai(format!(
                    "Invalid JSON from AI: {} | Raw: {}",
                    e,
                    excerpt(json_str)
                ))
            })?;
            if value.is_object() {
                Ok(value)
            } else {
                Err(Error::Ai("AI response JSON is not an object".into()))
            }
        }
        _ => Err(Error::Ai(format!(
            "No JSON object found in AI response | Raw: {}",
            excerpt(response)
        ))),
    }
}

/// Parse an audit document from a model response
pub fn parse_audit_response(response: &str) -> Result<AuditDocument> {
    let value = extract_json_object(response)?;
    AuditDocument::from_value(value)
}

/// Clean up a free-text chat answer
pub fn parse_chat_response(response: &str) -> Result<String> {
    let answer = response.trim();
    if answer.is_empty() {
        return Err(Error::Ai("AI returned an empty answer".into()));
    }
    Ok(answer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_with_prose_and_fences() {
        let response = "Here is the audit:\n```json\n{\"summary\": \"ok\", \"kpis\": []}\n```\nThanks!";
        let value = extract_json_object(response).unwrap();
        assert_eq!(value["summary"], "ok");
    }

    #[test]
    fn test_extract_json_missing() {
        let err = extract_json_object("I cannot help with that.").unwrap_err();
        assert!(err.to_string().contains("No JSON object"));
    }

    #[test]
    fn test_extract_json_invalid() {
        let err = extract_json_object("{\"summary\": oops}").unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn test_error_excerpt_is_char_safe() {
        let long = format!("{}{}", "é".repeat(300), "no json here");
        let err = extract_json_object(&long).unwrap_err();
        assert!(err.to_string().ends_with("..."));
    }

    #[test]
    fn test_parse_audit_response_keeps_unknown_fields() {
        let doc = parse_audit_response(
            r#"{"summary":"Margins improved","alerts":[{"severity":"warning","message":"Fees up"}],"confidence":0.8}"#,
        )
        .unwrap();

        assert_eq!(doc.summary, "Margins improved");
        assert_eq!(doc.alerts.len(), 1);
        assert_eq!(doc.raw["confidence"], 0.8);
    }

    #[test]
    fn test_parse_chat_response() {
        assert_eq!(parse_chat_response("  Margin is 30%.\n").unwrap(), "Margin is 30%.");
        assert!(parse_chat_response("   ").is_err());
    }
}
