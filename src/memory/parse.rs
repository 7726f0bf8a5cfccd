//! Parsing of agent responses.
//!
//! Agents ask the model for a JSON object holding one array of strings. Models
//! like to wrap that object in a Markdown code fence, so the fence is removed
//! first. Every failure is reported as an [`AgentResponseError`]; the calling
//! agent decides to fall back to an empty list.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentResponseError {
    #[error("response is not JSON: {0}")]
    NotJson(String),
    #[error("response has no '{0}' field")]
    MissingField(&'static str),
    #[error("field '{0}' is not a list of strings")]
    NotAStringList(&'static str),
}

/// Remove one surrounding ```` ``` ```` / ```` ```json ```` fence, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, …) up to the first newline.
    let body = match body.find('\n') {
        Some(nl) => &body[nl + 1..],
        None => body,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse `{"<field>": ["…", …]}`. Blank entries are dropped; others are
/// trimmed.
pub fn parse_string_list(text: &str, field: &'static str) -> Result<Vec<String>, AgentResponseError> {
    let value: Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AgentResponseError::NotJson(e.to_string()))?;

    let list = value.get(field).ok_or(AgentResponseError::MissingField(field))?;
    let items = list.as_array().ok_or(AgentResponseError::NotAStringList(field))?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(|s| s.trim().to_string())
                .ok_or(AgentResponseError::NotAStringList(field))
        })
        .filter(|r| !matches!(r, Ok(s) if s.is_empty()))
        .collect()
}
