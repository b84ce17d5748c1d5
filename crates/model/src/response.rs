use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::provider::ModelProviderError;

/// An open completion stream.
///
/// Events arrive in generation order. The stream is consumed once by a
/// single reader and cannot be restarted.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Polls for the next event of the completion.
    ///
    /// Returns `Ready(Ok(Some(_)))` for each event, `Ready(Ok(None))` once
    /// the stream is exhausted and `Ready(Err(_))` if the upstream failed.
    /// While nothing is available it returns `Pending` and arranges for
    /// the task to be woken.
    ///
    /// A [`ModelResponseEvent::Completed`] event is the last one carrying
    /// data. Polling after `None` keeps returning `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;
}

/// Why the upstream stopped generating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// Natural end of the answer.
    Stop,
    /// The output reached `max_output_tokens`.
    MaxTokens,
    /// Any other reason reported by the service.
    Other,
}

/// An event of a completion stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// A piece of generated text.
    MessageDelta(String),
    /// The completion finished.
    Completed(ModelFinishReason),
}
