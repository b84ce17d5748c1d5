use std::sync::Arc;

use axum::http::{HeaderMap, header};
use parley_core::Relay;

use crate::auth::{self, Authenticator, User};
use crate::store::ConversationStore;

/// Shared state of the server, built once at startup.
#[derive(Clone)]
pub struct AppState {
    /// Relay to the generation service.
    pub relay: Relay,
    /// Session lookup.
    pub auth: Arc<dyn Authenticator>,
    /// Conversation persistence.
    pub store: Arc<dyn ConversationStore>,
    public_origin: Option<Arc<str>>,
}

impl AppState {
    /// Creates the state from its parts.
    pub fn new(
        relay: Relay,
        auth: Arc<dyn Authenticator>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            relay,
            auth,
            store,
            public_origin: None,
        }
    }

    /// Sets the origin used for redirects instead of the `Host` header.
    pub fn with_public_origin(mut self, origin: Option<String>) -> Self {
        self.public_origin = origin.map(Into::into);
        self
    }

    /// Resolves the user of a request. Any lookup failure counts as
    /// signed out.
    pub(crate) async fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> Option<User> {
        let token = auth::access_token(headers)?;
        match self.auth.current_user(token).await {
            Ok(user) => user,
            Err(err) => {
                warn!("session lookup failed: {err}");
                None
            }
        }
    }

    /// Returns the origin redirects are relative to.
    pub(crate) fn origin(&self, headers: &HeaderMap) -> String {
        if let Some(origin) = &self.public_origin {
            return origin.to_string();
        }
        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("localhost");
        format!("http://{host}")
    }
}
