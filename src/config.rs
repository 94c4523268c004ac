// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Optional values stay optional here: a missing Discord credential or
//! signing secret is reported by the endpoint that needs it (503/500)
//! rather than refusing to start.

use std::env;

/// Site origin that is always allowed for CORS and used when
/// `SITE_BASE_URL` is not set.
pub const DEFAULT_SITE_BASE_URL: &str = "https://interdead.com";

/// OAuth state cookie lifetime.
pub const DEFAULT_STATE_TTL_SECONDS: u64 = 600;

/// Session cookie lifetime (30 days).
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 60 * 60 * 24 * 30;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord OAuth client ID (public)
    pub discord_client_id: Option<String>,
    /// Discord OAuth client secret
    pub discord_client_secret: Option<String>,
    /// Callback URL registered with Discord
    pub discord_redirect_uri: Option<String>,
    /// Public site URL, used for redirects and as an allowed origin
    pub site_base_url: String,
    /// Additional allowed CORS origins
    pub allowed_origins: Vec<String>,
    /// HMAC key for signed cookies (raw bytes)
    pub session_secret: Option<Vec<u8>>,
    /// SQLite URL for profile guards, identity links and scale triggers
    pub database_url: Option<String>,
    pub state_ttl_seconds: u64,
    pub session_ttl_seconds: u64,
    /// Server port
    pub port: u16,
}

impl Config {
    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            discord_client_id: Some("test_client_id".to_string()),
            discord_client_secret: Some("test_client_secret".to_string()),
            discord_redirect_uri: Some("https://api.test/auth/discord/callback".to_string()),
            site_base_url: "https://site.test".to_string(),
            allowed_origins: vec!["http://localhost:1313".to_string()],
            session_secret: Some(b"test_session_secret_32_bytes!!!!".to_vec()),
            database_url: Some("sqlite::memory:".to_string()),
            state_ttl_seconds: DEFAULT_STATE_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            port: 8787,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            discord_client_id: optional_var("IDENTITY_DISCORD_CLIENT_ID"),
            discord_client_secret: optional_var("IDENTITY_DISCORD_CLIENT_SECRET"),
            discord_redirect_uri: optional_var("IDENTITY_DISCORD_REDIRECT_URI"),
            site_base_url: optional_var("SITE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SITE_BASE_URL.to_string()),
            allowed_origins: optional_var("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            session_secret: optional_var("SESSION_SECRET").map(String::into_bytes),
            database_url: optional_var("DATABASE_URL"),
            state_ttl_seconds: parse_var("STATE_TTL_SECONDS", DEFAULT_STATE_TTL_SECONDS)?,
            session_ttl_seconds: parse_var("SESSION_TTL_SECONDS", DEFAULT_SESSION_TTL_SECONDS)?,
            port: parse_var("PORT", 8787)?,
        })
    }

    /// Whether the authorize redirect can be built at all.
    pub fn discord_configured(&self) -> bool {
        self.discord_client_id.is_some() && self.discord_redirect_uri.is_some()
    }
}

/// Read a variable, treating empty or whitespace-only values as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_var(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name, raw)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1:?}")]
    Invalid(&'static str, String),
}
