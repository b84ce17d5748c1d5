use std::pin::Pin;
use std::task::{Context, Poll, ready};

use parley_model::{ErrorKind, ModelResponse, ModelResponseEvent};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::Sse;
use crate::proto::{Finish, GenerateContentResponse, parse_finish_reason};

struct PartialState {
    sse: Sse,
    // A chunk can carry both the last fragment and the finish reason. The
    // fragment is delivered first, the reason waits here for the next poll.
    pending_finish_reason: Option<Finish>,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct GeminiResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl GeminiResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            pending_finish_reason: None,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for GeminiResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    if let Some(finish) = partial_state.pending_finish_reason.take() {
        return finish_event(finish, partial_state);
    }

    loop {
        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");

        let chunk = serde_json::from_str::<GenerateContentResponse>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if let Some(err) = chunk.error {
            return Err(Error::new(err.message.clone(), err.kind()));
        }
        if let Some(block_reason) = chunk
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(Error::new(
                format!("prompt blocked: {block_reason}"),
                ErrorKind::Moderated,
            ));
        }

        let Some(candidate) = chunk.candidates.into_iter().next() else {
            // Usage-only chunks carry no candidate.
            continue;
        };
        let finish = candidate.finish_reason.as_deref().map(parse_finish_reason);
        if finish == Some(Finish::Blocked) {
            return finish_event(Finish::Blocked, partial_state);
        }

        let text = candidate.text();
        if !text.is_empty() {
            partial_state.pending_finish_reason = finish;
            return Ok((
                Some(ModelResponseEvent::MessageDelta(text)),
                partial_state,
            ));
        }
        if let Some(finish) = finish {
            return finish_event(finish, partial_state);
        }
    }

    Ok((None, partial_state))
}

#[inline]
fn finish_event(
    finish: Finish,
    partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    match finish {
        Finish::Done(reason) => Ok((
            Some(ModelResponseEvent::Completed(reason)),
            partial_state,
        )),
        Finish::Blocked => Err(Error::new(
            "candidate was blocked",
            ErrorKind::Moderated,
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use parley_model::{ModelFinishReason, ModelProviderError};

    use super::*;
    use crate::io::Chunks;

    async fn collect(
        chunks: Chunks,
    ) -> (Vec<ModelResponseEvent>, Option<Error>) {
        let mut resp = pin!(GeminiResponse::from_sse(Sse::new(chunks)));
        let mut events = Vec::new();
        loop {
            match poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => return (events, None),
                Err(err) => return (events, Some(err)),
            }
        }
    }

    #[tokio::test]
    async fn test_simple_events() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(include_bytes!(
                "../fixtures/test_response.txt"
            ))]
            .into(),
        );
        let (events, err) = collect(chunks).await;
        assert!(err.is_none());
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::MessageDelta("Hello".to_owned()),
                ModelResponseEvent::MessageDelta("! How can".to_owned()),
                ModelResponseEvent::MessageDelta(" I help?".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn test_error_after_fragment() {
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(
                    b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi\"}]}}]}\r\n\r\n",
                ),
                Bytes::from_static(
                    b"data: {\"error\":{\"code\":500,\"message\":\"boom\",\"status\":\"INTERNAL\"}}\r\n\r\n",
                ),
            ]
            .into(),
        );
        let (events, err) = collect(chunks).await;
        assert_eq!(
            events,
            vec![ModelResponseEvent::MessageDelta("Hi".to_owned())]
        );
        let err = err.unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(err.message(), "boom");
    }

    #[tokio::test]
    async fn test_blocked_candidate() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(
                b"data: {\"candidates\":[{\"finishReason\":\"SAFETY\"}]}\n\n",
            )]
            .into(),
        );
        let (events, err) = collect(chunks).await;
        assert!(events.is_empty());
        assert_eq!(err.unwrap().kind(), ErrorKind::Moderated);
    }

    #[tokio::test]
    async fn test_transport_error() {
        let chunks = Chunks::failing_after(
            vec![Bytes::from_static(
                b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi\"}]}}]}\n\n",
            )]
            .into(),
        );
        let (events, err) = collect(chunks).await;
        assert_eq!(events.len(), 1);
        assert!(err.is_some());
    }
}
