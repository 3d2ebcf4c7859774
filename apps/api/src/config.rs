use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Base URL rhyme artwork is served from. Prefetching is disabled when unset.
    pub asset_base_url: Option<String>,
    /// How many pages past the viewed one get their artwork prefetched.
    pub prefetch_ahead: i32,
    /// Binder sessions unused for this long are dropped from memory.
    pub session_idle: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            asset_base_url: std::env::var("ASSET_BASE_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            prefetch_ahead: std::env::var("PREFETCH_AHEAD")
                .unwrap_or_else(|_| "2".to_string())
                .parse::<i32>()
                .context("PREFETCH_AHEAD must be an integer")?,
            session_idle: Duration::from_secs(
                std::env::var("SESSION_IDLE_SECS")
                    .unwrap_or_else(|_| "1800".to_string())
                    .parse::<u64>()
                    .context("SESSION_IDLE_SECS must be a number of seconds")?,
            ),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
