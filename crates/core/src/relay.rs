use std::fmt::{self, Display, Formatter};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use parley_model::{
    ErrorKind, GenerationParams, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use thiserror::Error;
use tracing::{Instrument, Span};

use crate::prompt::Prompt;

type UpstreamStream =
    Pin<Box<dyn Stream<Item = Result<String, RelayError>> + Send>>;
type BoxedOpenFuture =
    Pin<Box<dyn Future<Output = Result<UpstreamStream, RelayError>> + Send>>;
type HandlerFn = Arc<dyn Fn(ModelRequest) -> BoxedOpenFuture + Send + Sync>;

/// An error raised while relaying a completion.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The upstream failed before any fragment reached the caller.
    #[error("upstream failed ({kind}): {message}")]
    Upstream {
        /// The kind reported by the provider.
        kind: ErrorKind,
        /// The provider's message, for logs only.
        message: String,
    },
    /// The upstream failed after at least one fragment was delivered.
    #[error("upstream failed mid-stream ({kind}): {message}")]
    MidStream {
        /// The kind reported by the provider.
        kind: ErrorKind,
        /// The provider's message, for logs only.
        message: String,
    },
}

impl RelayError {
    fn upstream<E: ModelProviderError>(err: &E) -> Self {
        RelayError::Upstream {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    fn into_mid_stream(self) -> Self {
        match self {
            RelayError::Upstream { kind, message } => {
                RelayError::MidStream { kind, message }
            }
            mid_stream => mid_stream,
        }
    }

    /// Returns the kind reported by the provider.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Upstream { kind, .. }
            | RelayError::MidStream { kind, .. } => *kind,
        }
    }
}

/// Lifecycle of a single chat request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelayState {
    /// The request was received and its body validated.
    Idle,
    /// The caller is signed in.
    Authenticated,
    /// The prompt is assembled and ready to send.
    PromptBuilt,
    /// Fragments are being relayed to the caller.
    Streaming,
    /// The upstream finished and every fragment was relayed.
    Completed,
    /// The upstream failed after streaming started.
    Failed,
}

impl Display for RelayState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayState::Idle => "idle",
            RelayState::Authenticated => "authenticated",
            RelayState::PromptBuilt => "prompt-built",
            RelayState::Streaming => "streaming",
            RelayState::Completed => "completed",
            RelayState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A wrapper around a model provider that opens one upstream stream per
/// prompt and relays its fragments, hiding the provider type from the
/// callers.
///
/// The relay is immutable and cheap to clone; create it once at startup.
#[derive(Clone)]
pub struct Relay {
    handler_fn: HandlerFn,
}

impl Relay {
    /// Creates a relay that sends every prompt to `provider`.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `Relay` is shared through the
        // server state and we don't want a generic parameter there.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(async move {
                let resp = fut.await.map_err(|err| {
                    error!("failed to open upstream: {err}");
                    RelayError::upstream(&err)
                })?;
                Ok(Box::pin(fragments(resp)) as UpstreamStream)
            })
        });
        Self { handler_fn }
    }

    /// Opens an upstream stream for `prompt` and waits for its first
    /// fragment.
    ///
    /// Any failure up to that point is returned as
    /// [`RelayError::Upstream`], so the caller can still answer with an
    /// error status. Failures after that surface inside the returned stream
    /// as [`RelayError::MidStream`].
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the future or the returned
    /// stream drops the upstream response as well.
    pub async fn open(
        &self,
        prompt: &Prompt,
        params: GenerationParams,
    ) -> Result<FragmentStream, RelayError> {
        let span = debug_span!("relay", tone = %prompt.tone());
        let req = ModelRequest {
            prompt: prompt.as_str().to_owned(),
            params,
        };
        let handler_fn = Arc::clone(&self.handler_fn);
        async move {
            trace!("opening upstream: {:?}", req.params);
            let mut upstream = handler_fn(req).await?;

            let first = match upstream.next().await {
                Some(Ok(fragment)) => Some(fragment),
                Some(Err(err)) => {
                    error!("upstream failed before the first fragment: {err}");
                    return Err(err);
                }
                None => None,
            };
            debug!(empty = first.is_none(), "upstream is streaming");

            Ok(FragmentStream {
                first,
                upstream: Some(upstream),
                delivered: 0,
                state: RelayState::Streaming,
                span: Span::current(),
            })
        }
        .instrument(span)
        .await
    }
}

/// Adapts a model response into a stream of non-empty text fragments.
fn fragments<R: ModelResponse>(
    resp: R,
) -> impl Stream<Item = Result<String, RelayError>> + Send + 'static {
    let mut resp = Box::pin(resp);
    let mut finished = false;
    stream::poll_fn(move |cx| {
        if finished {
            return Poll::Ready(None);
        }
        loop {
            match ready!(resp.as_mut().poll_next_event(cx)) {
                Ok(Some(ModelResponseEvent::MessageDelta(delta))) => {
                    if delta.is_empty() {
                        continue;
                    }
                    return Poll::Ready(Some(Ok(delta)));
                }
                Ok(Some(ModelResponseEvent::Completed(reason))) => {
                    debug!("upstream finished: {reason:?}");
                }
                Ok(None) => {
                    finished = true;
                    return Poll::Ready(None);
                }
                Err(err) => {
                    finished = true;
                    return Poll::Ready(Some(Err(RelayError::upstream(&err))));
                }
            }
        }
    })
}

/// Fragments of one completion, in arrival order.
///
/// The stream ends when the upstream completes. If the upstream fails, one
/// [`RelayError::MidStream`] is yielded and the stream ends.
pub struct FragmentStream {
    first: Option<String>,
    upstream: Option<UpstreamStream>,
    delivered: usize,
    state: RelayState,
    span: Span,
}

impl FragmentStream {
    /// Returns the current state: streaming, completed or failed.
    #[inline]
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Returns the number of fragments handed out so far.
    #[inline]
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl Stream for FragmentStream {
    type Item = Result<Bytes, RelayError>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let _enter = this.span.enter();

        if let Some(first) = this.first.take() {
            this.delivered += 1;
            trace!("relaying fragment #{}", this.delivered);
            return Poll::Ready(Some(Ok(Bytes::from(first))));
        }

        let Some(upstream) = this.upstream.as_mut() else {
            return Poll::Ready(None);
        };
        match ready!(upstream.as_mut().poll_next(cx)) {
            Some(Ok(fragment)) => {
                this.delivered += 1;
                trace!("relaying fragment #{}", this.delivered);
                Poll::Ready(Some(Ok(Bytes::from(fragment))))
            }
            Some(Err(err)) => {
                this.upstream = None;
                this.state = RelayState::Failed;
                let err = err.into_mid_stream();
                error!(delivered = this.delivered, "{err}");
                Poll::Ready(Some(Err(err)))
            }
            None => {
                this.upstream = None;
                this.state = RelayState::Completed;
                debug!(delivered = this.delivered, "relay completed");
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for FragmentStream {
    fn drop(&mut self) {
        if self.state == RelayState::Streaming {
            let _enter = self.span.enter();
            debug!(
                delivered = self.delivered,
                "caller went away, dropping upstream"
            );
        }
    }
}
