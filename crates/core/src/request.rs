//! Parsing and validation of the chat request body.

use serde_json::Value;
use thiserror::Error;

use crate::transcript::HistoryEntry;

/// The reason a request body was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The body is not a JSON object.
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    /// `message` is missing, not a string, or blank.
    #[error("valid message is required")]
    InvalidMessage,
}

/// A validated chat request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatRequest {
    /// The message as sent, untrimmed.
    pub message: String,
    /// Prior turns, oldest first. Empty when absent or unreadable.
    pub history: Vec<HistoryEntry>,
    /// Whether the client sent a non-empty `conversationHistory`, even one
    /// that is not an array of turns.
    pub has_history: bool,
}

impl ChatRequest {
    /// Parses and validates a JSON body of the shape
    /// `{ "message": string, "conversationHistory"?: [{ role, content }] }`.
    ///
    /// A `conversationHistory` that is not an array yields no turns, but
    /// still marks the conversation as under way unless it is `null`,
    /// `false`, `0` or `""`.
    pub fn from_json(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|err| ValidationError::MalformedBody(err.to_string()))?;
        Self::from_value(&value)
    }

    /// Validates an already parsed body. See [`ChatRequest::from_json`].
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or(ValidationError::InvalidMessage)?;
        let raw_history = value.get("conversationHistory");
        let history = raw_history
            .and_then(Value::as_array)
            .map(|entries| {
                entries.iter().map(HistoryEntry::from_value).collect()
            })
            .unwrap_or_default();
        Ok(Self {
            message: message.to_owned(),
            history,
            has_history: raw_history.is_some_and(is_non_empty),
        })
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(entries) => !entries.is_empty(),
        Value::Object(_) => true,
    }
}
