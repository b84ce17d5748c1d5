//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use parley_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

/// A scripted failure of [`TestModelProvider`].
#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "test model: {}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A response replaying a [`PresetResponse`], one event per delay.
pub struct TestModelResponse {
    events: VecDeque<PresetEvent>,
    completed: bool,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
    live: Arc<AtomicUsize>,
}

impl Drop for TestModelResponse {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if this.completed {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            return match this.events.pop_front() {
                Some(PresetEvent::MessageDelta(msg)) => {
                    Poll::Ready(Ok(Some(ModelResponseEvent::MessageDelta(msg))))
                }
                Some(PresetEvent::Failure) => {
                    this.completed = true;
                    Poll::Ready(Err(Error {
                        message: "scripted failure",
                        kind: ErrorKind::Other,
                    }))
                }
                None => {
                    this.completed = true;
                    Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                        ModelFinishReason::Stop,
                    ))))
                }
            };
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

/// A local fake model for testing purpose.
///
/// The provider replays the same preset response for every request and
/// records each request it receives, so tests can assert whether (and
/// with which prompt) the generation service was called.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    response: PresetResponse,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
    live: Arc<AtomicUsize>,
}

impl TestModelProvider {
    /// Creates a provider that replays `preset` for every request.
    #[inline]
    pub fn with_response(preset: PresetResponse) -> Self {
        Self {
            response: preset,
            ..Default::default()
        }
    }

    /// Sets the time each event takes to arrive. Defaults to 1ms.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns all requests received so far, in order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of requests received so far.
    #[inline]
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns the number of responses handed out and not dropped yet.
    #[inline]
    pub fn open_responses(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req.clone());

        if self.response.fail_on_open {
            return ready(Err(Error {
                message: "failed to open stream",
                kind: ErrorKind::Other,
            }));
        }

        self.live.fetch_add(1, Ordering::SeqCst);
        let resp = TestModelResponse {
            events: self.response.events.iter().cloned().collect(),
            completed: false,
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
            live: Arc::clone(&self.live),
        };
        ready(Ok(resp))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use parley_model::GenerationParams;

    use super::*;

    fn request(prompt: &str) -> ModelRequest {
        ModelRequest {
            prompt: prompt.to_owned(),
            params: GenerationParams {
                temperature: 0.6,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 2048,
            },
        }
    }

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Result<(), Error>) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        loop {
            match poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await {
                Ok(Some(ModelResponseEvent::MessageDelta(delta))) => {
                    msg.push_str(&delta);
                }
                Ok(Some(ModelResponseEvent::Completed(_))) => {}
                Ok(None) => return (msg, Ok(())),
                Err(err) => return (msg, Err(err)),
            }
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let provider = TestModelProvider::with_response(
            PresetResponse::with_fragments(["Hello, ", "world!"]),
        );

        let resp = provider.send_request(&request("Hi")).await.unwrap();
        let (msg, result) = collect_response(resp).await;
        assert_eq!(msg, "Hello, world!");
        assert!(result.is_ok());

        // Every request replays the same script.
        let resp = provider.send_request(&request("Again")).await.unwrap();
        let (msg, _) = collect_response(resp).await;
        assert_eq!(msg, "Hello, world!");

        let prompts: Vec<_> =
            provider.requests().into_iter().map(|r| r.prompt).collect();
        assert_eq!(prompts, ["Hi", "Again"]);
    }

    #[tokio::test]
    async fn test_failure_mid_stream() {
        let provider =
            TestModelProvider::with_response(PresetResponse::with_events([
                PresetEvent::MessageDelta("partial".to_owned()),
                PresetEvent::Failure,
                PresetEvent::MessageDelta("never".to_owned()),
            ]));
        let resp = provider.send_request(&request("Hi")).await.unwrap();
        let (msg, result) = collect_response(resp).await;
        assert_eq!(msg, "partial");
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_failure_on_open() {
        let provider =
            TestModelProvider::with_response(PresetResponse::failing_on_open());
        let result = provider.send_request(&request("Hi")).await;
        assert!(result.is_err());
        assert_eq!(provider.request_count(), 1);
        assert_eq!(provider.open_responses(), 0);
    }

    #[tokio::test]
    async fn test_open_responses() {
        let provider =
            TestModelProvider::with_response(PresetResponse::with_fragments([
                "a",
            ]));
        let first = provider.send_request(&request("Hi")).await.unwrap();
        let second = provider.clone().send_request(&request("Hi")).await;
        assert_eq!(provider.open_responses(), 2);

        drop(first);
        assert_eq!(provider.open_responses(), 1);
        let (msg, _) = collect_response(second.unwrap()).await;
        assert_eq!(msg, "a");
        assert_eq!(provider.open_responses(), 0);
    }
}
