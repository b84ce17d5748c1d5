//! Session lookup against the hosted auth provider.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cookie carrying the access token of a signed-in browser.
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
/// Cookie carrying the PKCE verifier set by the client before sign-in.
pub const CODE_VERIFIER_COOKIE: &str = "sb-code-verifier";

/// A signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Provider-assigned identifier.
    pub id: String,
    /// Email address, when the provider shares one.
    #[serde(default)]
    pub email: Option<String>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// The session returned by a successful code exchange.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthSession {
    /// Bearer token for subsequent requests.
    pub access_token: String,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// The user the session belongs to.
    pub user: User,
}

/// An error talking to the auth provider.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider could not be reached.
    #[error("auth provider unreachable: {0}")]
    Transport(String),
    /// The provider answered with an unexpected status.
    #[error("auth provider rejected the request ({status}): {message}")]
    Rejected {
        /// HTTP status of the answer.
        status: u16,
        /// Body of the answer.
        message: String,
    },
    /// The provider's answer could not be decoded.
    #[error("malformed auth provider response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::Malformed(err.to_string())
        } else {
            AuthError::Transport(err.to_string())
        }
    }
}

/// Resolves sessions for incoming requests.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns the user owning `access_token`, or `None` if the token is
    /// not (or no longer) valid.
    async fn current_user(
        &self,
        access_token: &str,
    ) -> Result<Option<User>, AuthError>;

    /// Exchanges a one-time OAuth code for a session.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<AuthSession, AuthError>;
}

/// Returns the access token of a request, taken from a bearer
/// `Authorization` header or from the session cookie.
pub fn access_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    bearer.or_else(|| cookie(headers, ACCESS_TOKEN_COOKIE))
}

/// Returns the value of cookie `name`, if the request carries it.
pub fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Connection settings of the hosted auth provider.
#[derive(Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    url: String,
    anon_key: String,
}

impl SupabaseConfig {
    /// Creates the settings for the project at `url`.
    pub fn new<U: Into<String>, K: Into<String>>(url: U, anon_key: K) -> Self {
        let mut url = url.into();
        while url.ends_with('/') {
            url.pop();
        }
        Self {
            url,
            anon_key: anon_key.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.url)
    }
}

impl Debug for SupabaseConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .finish()
    }
}

/// An [`Authenticator`] backed by the Supabase auth REST API.
#[derive(Clone, Debug)]
pub struct SupabaseAuth {
    client: Client,
    config: Arc<SupabaseConfig>,
}

impl SupabaseAuth {
    /// Creates a client for the project described by `config`.
    #[inline]
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
}

#[async_trait]
impl Authenticator for SupabaseAuth {
    async fn current_user(
        &self,
        access_token: &str,
    ) -> Result<Option<User>, AuthError> {
        let resp = self
            .client
            .get(self.config.endpoint("user"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => Ok(Some(resp.json().await?)),
            status => Err(AuthError::Rejected {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<AuthSession, AuthError> {
        let resp = self
            .client
            .post(self.config.endpoint("token?grant_type=pkce"))
            .header("apikey", &self.config.anon_key)
            .json(&PkceGrant {
                auth_code: code,
                code_verifier,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(resp.json().await?)
    }
}
