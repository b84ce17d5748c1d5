//! The OAuth callback that finishes a sign-in.

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::{
    ACCESS_TOKEN_COOKIE, AuthSession, CODE_VERIFIER_COOKIE, cookie,
};
use crate::state::AppState;

const DEFAULT_NEXT: &str = "/chat";
const NEW_USER_WINDOW_SECS: i64 = 60;

pub(crate) fn routes() -> Router<AppState> {
    Router::new().route("/auth/callback", get(callback))
}

#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    next: Option<String>,
    source: Option<String>,
}

async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let origin = state.origin(&headers);
    let error_page = || Redirect::temporary(&format!("{origin}/auth/error"));

    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        debug!("callback without code");
        return error_page().into_response();
    };

    let verifier = cookie(&headers, CODE_VERIFIER_COOKIE);
    let session = match state.auth.exchange_code(code, verifier).await {
        Ok(session) => session,
        Err(err) => {
            warn!("code exchange failed: {err}");
            return error_page().into_response();
        }
    };

    let target = callback_target(
        &origin,
        params.source.as_deref(),
        params.next.as_deref(),
        session.user.created_at,
        Utc::now(),
    );
    info!(user = %session.user.id, %target, "signed in");
    (
        [(header::SET_COOKIE, session_cookie(&session))],
        Redirect::temporary(&target),
    )
        .into_response()
}

fn session_cookie(session: &AuthSession) -> String {
    let mut cookie = format!(
        "{ACCESS_TOKEN_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        session.access_token
    );
    if let Some(max_age) = session.expires_in {
        cookie.push_str(&format!("; Max-Age={max_age}"));
    }
    cookie
}

/// Decides where a successful sign-in lands.
///
/// An account counts as new when it was created less than a minute before
/// `now`. Signing in with a new account, or signing up with an existing
/// one, goes back to the login page with a hint; everything else continues
/// to `next` (default `/chat`). `next` must be a local path.
pub fn callback_target(
    origin: &str,
    source: Option<&str>,
    next: Option<&str>,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> String {
    let is_new_user = (now - created_at).num_seconds() < NEW_USER_WINDOW_SECS;
    match source {
        Some("login") if is_new_user => {
            format!("{origin}/auth/login?new_user=true")
        }
        Some("signup") if !is_new_user => {
            format!("{origin}/auth/login?existing_user=true")
        }
        _ => {
            let next = next
                .filter(|path| path.starts_with('/') && !path.starts_with("//"))
                .unwrap_or(DEFAULT_NEXT);
            format!("{origin}{next}")
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    const ORIGIN: &str = "https://chat.example.com";

    fn at(secs_ago: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now - TimeDelta::seconds(secs_ago), now)
    }

    #[test]
    fn test_login_with_new_account() {
        let (created, now) = at(5);
        assert_eq!(
            callback_target(ORIGIN, Some("login"), None, created, now),
            "https://chat.example.com/auth/login?new_user=true"
        );
    }

    #[test]
    fn test_signup_with_existing_account() {
        let (created, now) = at(3600);
        assert_eq!(
            callback_target(ORIGIN, Some("signup"), Some("/x"), created, now),
            "https://chat.example.com/auth/login?existing_user=true"
        );
    }

    #[test]
    fn test_regular_sign_in() {
        let (created, now) = at(3600);
        assert_eq!(
            callback_target(ORIGIN, Some("login"), None, created, now),
            "https://chat.example.com/chat"
        );
        assert_eq!(
            callback_target(ORIGIN, None, Some("/settings"), created, now),
            "https://chat.example.com/settings"
        );

        let (created, now) = at(5);
        assert_eq!(
            callback_target(ORIGIN, Some("signup"), None, created, now),
            "https://chat.example.com/chat"
        );
    }

    #[test]
    fn test_new_user_window_boundary() {
        let (created, now) = at(60);
        assert_eq!(
            callback_target(ORIGIN, Some("login"), None, created, now),
            "https://chat.example.com/chat"
        );
    }

    #[test]
    fn test_foreign_next_is_ignored() {
        let (created, now) = at(3600);
        for next in ["//evil.example", "@evil.example", "https://evil.example"] {
            assert_eq!(
                callback_target(ORIGIN, None, Some(next), created, now),
                "https://chat.example.com/chat"
            );
        }
    }

    #[test]
    fn test_session_cookie() {
        let session: AuthSession = serde_json::from_value(serde_json::json!({
            "access_token": "tok",
            "expires_in": 3600,
            "user": { "id": "u1", "created_at": "2024-01-01T00:00:00Z" }
        }))
        .unwrap();
        assert_eq!(
            session_cookie(&session),
            "sb-access-token=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600"
        );
    }
}
