use std::error::Error;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// The error type of a model provider.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Classifies the failure.
    fn kind(&self) -> ErrorKind;
}

/// A client of a streaming generation service.
///
/// A provider is shared by all concurrent chat requests, so it must not
/// keep per-request state. Anything it holds (an HTTP client, its
/// configuration) is set up once and only read afterwards.
pub trait ModelProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// The response type for this provider.
    type Response: ModelResponse<Error = Self::Error>;

    /// Opens a completion stream for `req`.
    ///
    /// The returned future does not borrow the provider, so it can be
    /// driven after the provider is gone. Each call opens exactly one
    /// upstream stream and failures are not retried.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
