//! Startup configuration read from the environment.

use std::env;
use std::net::SocketAddr;

use parley_gemini_model::{GeminiConfig, GeminiConfigBuilder};
use thiserror::Error;

use crate::auth::SupabaseConfig;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// An error in the startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    /// A variable is set to a value that cannot be used.
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// Name of the variable.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Process-wide configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Generation service settings.
    pub gemini: GeminiConfig,
    /// Hosted auth provider settings.
    pub supabase: SupabaseConfig,
    /// Address the server listens on.
    pub bind_addr: SocketAddr,
    /// Public origin used to build redirects, e.g. `https://chat.example.com`.
    pub public_origin: Option<String>,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require =
            |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let api_key = require("GEMINI_API_KEY")?;
        let mut gemini = GeminiConfigBuilder::with_api_key(api_key);
        if let Some(model) = get("GEMINI_MODEL") {
            gemini = gemini.with_model(model);
        }
        if let Some(base_url) = get("GEMINI_BASE_URL") {
            gemini = gemini.with_base_url(base_url);
        }

        let supabase = SupabaseConfig::new(
            require("SUPABASE_URL")?,
            require("SUPABASE_ANON_KEY")?,
        );

        let bind_addr = get("PARLEY_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned());
        let bind_addr =
            bind_addr.parse().map_err(|err| ConfigError::Invalid {
                name: "PARLEY_BIND_ADDR",
                reason: format!("{err}"),
            })?;

        let public_origin = get("PARLEY_PUBLIC_ORIGIN")
            .map(|origin| origin.trim_end_matches('/').to_owned());

        Ok(Self {
            gemini: gemini.build(),
            supabase,
            bind_addr,
            public_origin,
        })
    }
}
