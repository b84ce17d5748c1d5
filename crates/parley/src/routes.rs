pub(crate) mod callback;
pub(crate) mod chat;
pub(crate) mod conversations;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub(crate) fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health() -> &'static str {
    "ok"
}
