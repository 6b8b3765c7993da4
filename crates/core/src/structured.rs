//! Parsing of structured (JSON) output from generative models.
//!
//! Model output is never trusted to be well formed. Every call site receives a
//! `Result` and must decide what its failure branch degrades to.

use crate::error::StructuredOutputError;
use serde::de::DeserializeOwned;

/// Parse model text as `T`.
///
/// Accepts bare JSON, JSON wrapped in a Markdown code fence, or JSON embedded
/// in surrounding prose (the outermost `[...]` or `{...}` span is tried).
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, StructuredOutputError> {
    let trimmed = strip_code_fence(raw.trim());
    if trimmed.is_empty() {
        return Err(StructuredOutputError::Empty);
    }

    let first_err = match serde_json::from_str::<T>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some(span) = outermost_json_span(trimmed)
        && span.len() < trimmed.len()
        && let Ok(value) = serde_json::from_str::<T>(span)
    {
        return Ok(value);
    }

    Err(StructuredOutputError::Malformed {
        reason: first_err.to_string(),
        raw: raw.to_string(),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn outermost_json_span(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let close = if text[start..].starts_with('[') { ']' } else { '}' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
