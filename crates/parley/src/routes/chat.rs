//! The two chat endpoints.
//!
//! Both run the same pipeline and differ only in the [`PromptVariant`]
//! they build the prompt with.

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use bytes::Bytes;
use parley_core::{ChatRequest, PromptBuilder, PromptVariant, RelayState};
use tracing::instrument;

use crate::error::ChatError;
use crate::state::AppState;

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(chat_stream))
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ChatError> {
    handle_chat(&state, PromptVariant::Conversational, &headers, &body).await
}

async fn chat_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ChatError> {
    handle_chat(&state, PromptVariant::Structured, &headers, &body).await
}

#[instrument(level = "debug", skip_all, fields(?variant))]
async fn handle_chat(
    state: &AppState,
    variant: PromptVariant,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ChatError> {
    // Validate before looking up the session.
    let req = ChatRequest::from_json(body).inspect_err(|err| {
        debug!("rejected chat request: {err}");
    })?;

    debug!(state = %RelayState::Idle);

    let Some(user) = state.authenticate(headers).await else {
        return Err(ChatError::Unauthorized);
    };
    debug!(user = %user.id, state = %RelayState::Authenticated);

    let prompt = PromptBuilder::for_request(variant, &req).build(&req.message);
    debug!(tone = %prompt.tone(), state = %RelayState::PromptBuilt);

    let fragments = state.relay.open(&prompt, variant.params()).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain")],
        Body::from_stream(fragments),
    )
        .into_response())
}
