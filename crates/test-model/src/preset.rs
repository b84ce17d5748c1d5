use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    /// Emits a text fragment.
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    /// Fails the stream at this point.
    #[serde(rename = "failure")]
    Failure,
}

/// The preset response returned for every request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, opening the stream fails before any event.
    #[serde(default)]
    pub fail_on_open: bool,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            fail_on_open: false,
        }
    }

    /// Creates a `PresetResponse` whose stream cannot be opened.
    #[inline]
    pub fn failing_on_open() -> Self {
        Self {
            events: Vec::new(),
            fail_on_open: true,
        }
    }

    /// Creates a `PresetResponse` from plain text fragments.
    pub fn with_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_events(
            fragments
                .into_iter()
                .map(|s| PresetEvent::MessageDelta(s.into()))
                .collect::<Vec<_>>(),
        )
    }
}
