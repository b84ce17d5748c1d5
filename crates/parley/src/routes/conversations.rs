//! Conversation history endpoints used by the browser client.

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{Conversation, DEFAULT_TITLE, Role, StoredMessage};

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/api/conversations/{id}",
            get(get_conversation).delete(delete_conversation),
        )
        .route(
            "/api/conversations/{id}/messages",
            get(list_messages).post(append_message),
        )
        .route("/api/conversations/{id}/export", get(export_conversation))
}

/// The signed-in user of a request.
pub(crate) struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state
            .authenticate(&parts.headers)
            .await
            .map(CurrentUser)
            .ok_or(ApiError::Unauthorized)
    }
}

/// Parses an optional JSON body. An empty body yields the default value.
fn parse_body<T>(body: &[u8]) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| ApiError::BadRequest(err.to_string()))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    q: Option<String>,
}

async fn list_conversations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let mut conversations = state.store.list_conversations(&user.id).await?;
    let needle = query.q.as_deref().map(str::trim).unwrap_or_default();
    if !needle.is_empty() {
        let needle = needle.to_lowercase();
        conversations.retain(|c| c.title.to_lowercase().contains(&needle));
    }
    Ok(Json(conversations))
}

#[derive(Debug, Default, Deserialize)]
struct NewConversation {
    title: Option<String>,
}

async fn create_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Bytes,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let req: NewConversation = parse_body(&body)?;
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TITLE);
    let conversation = state.store.create_conversation(&user.id, title).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn get_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(state.store.get_conversation(&user.id, id).await?))
}

async fn delete_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_conversation(&user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StoredMessage>>, ApiError> {
    Ok(Json(state.store.list_messages(&user.id, id).await?))
}

#[derive(Debug, Deserialize)]
struct NewMessage {
    role: Role,
    content: String,
}

async fn append_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<(StatusCode, Json<StoredMessage>), ApiError> {
    let req: NewMessage = serde_json::from_slice(&body)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content must not be empty".into()));
    }
    let message = state
        .store
        .append_message(&user.id, id, req.role, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Serialize)]
struct ExportedMessage<'a> {
    role: Role,
    content: &'a str,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct Export<'a> {
    title: &'a str,
    created_at: DateTime<Utc>,
    messages: Vec<ExportedMessage<'a>>,
}

async fn export_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let conversation = state.store.get_conversation(&user.id, id).await?;
    let messages = state.store.list_messages(&user.id, id).await?;
    let export = Export {
        title: &conversation.title,
        created_at: conversation.created_at,
        messages: messages
            .iter()
            .map(|m| ExportedMessage {
                role: m.role,
                content: &m.content,
                timestamp: m.created_at,
            })
            .collect(),
    };
    let body = serde_json::to_vec_pretty(&export)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let disposition = format!(
        "attachment; filename=\"{}-export.json\"",
        export_file_stem(&conversation.title)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// Keeps a title usable inside a quoted header parameter.
fn export_file_stem(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            '"' | '\\' | '/' => '_',
            c if c.is_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect()
}
