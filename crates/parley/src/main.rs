//! Runs the chat server.

#[macro_use]
extern crate tracing;

use std::sync::Arc;

use anyhow::Context as _;
use parley::auth::SupabaseAuth;
use parley::core::Relay;
use parley::store::MemoryStore;
use parley::{AppState, Config};
use parley_gemini_model::GeminiProvider;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    debug!(?config, "loaded configuration");

    let relay = Relay::new(GeminiProvider::new(config.gemini.clone()));
    let auth = SupabaseAuth::new(config.supabase.clone());
    let store = MemoryStore::new();
    let state = AppState::new(relay, Arc::new(auth), Arc::new(store))
        .with_public_origin(config.public_origin.clone());

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, parley::router(state))
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            info!("shutting down");
        })
        .await?;
    Ok(())
}
