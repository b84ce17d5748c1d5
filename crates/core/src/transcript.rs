//! Flattening of prior turns into a textual transcript.

use serde::Serialize;
use serde_json::Value;

/// The maximum number of prior turns that make it into the transcript.
pub const HISTORY_WINDOW: usize = 10;

/// One prior turn as received from the caller.
///
/// Both fields are optional since callers may send partial entries. Such
/// entries are kept in the history (they still count towards the window
/// and the first-turn check) but never rendered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct HistoryEntry {
    /// `"user"` or `"assistant"`.
    pub role: Option<String>,
    /// The text of the turn.
    pub content: Option<String>,
}

impl HistoryEntry {
    /// Creates an entry with both fields set.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            content: Some(content.into()),
        }
    }

    /// Reads an entry from an arbitrary JSON value.
    ///
    /// Fields that are not non-empty strings are treated as missing.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
        };
        Self {
            role: field("role"),
            content: field("content"),
        }
    }

    fn render(&self, assistant_name: &str) -> Option<String> {
        let role = self.role.as_deref().filter(|s| !s.is_empty())?;
        let content = self.content.as_deref().filter(|s| !s.is_empty())?;
        let speaker = if role == "user" { "Human" } else { assistant_name };
        Some(format!("{speaker}: {content}"))
    }
}

/// Returns whether `history` describes the first turn of a conversation.
#[inline]
pub fn is_first_turn(history: &[HistoryEntry]) -> bool {
    history.is_empty()
}

/// Renders the trailing window of `history` as a transcript block.
///
/// The window is taken before incomplete entries are dropped. A non-empty
/// transcript ends with a blank line.
pub fn render_transcript(
    history: &[HistoryEntry],
    assistant_name: &str,
) -> String {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let mut transcript = history[start..]
        .iter()
        .filter_map(|entry| entry.render(assistant_name))
        .collect::<Vec<_>>()
        .join("\n");
    if !transcript.is_empty() {
        transcript.push_str("\n\n");
    }
    transcript
}
