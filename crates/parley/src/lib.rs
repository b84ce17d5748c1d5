//! The HTTP server of the chat application.
//!
//! The crate wires the prompt pipeline from [`parley_core`] to the outside
//! world: the chat endpoints, the hosted auth provider, and a conversation
//! store used by the browser client to persist its history.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod auth;
pub mod config;
mod error;
mod routes;
mod state;
pub mod store;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::{ApiError, ChatError};
pub use routes::callback::callback_target;
pub use state::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::chat::routes())
        .merge(routes::callback::routes())
        .merge(routes::conversations::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Re-exports of [`parley_core`] crate.
pub mod core {
    pub use parley_core::*;
}
