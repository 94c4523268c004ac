// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use interdead_auth::config::Config;
use interdead_auth::db::{self, ProfileGuardRepository};
use interdead_auth::error::AppError;
use interdead_auth::models::SessionProfile;
use interdead_auth::routes::create_router;
use interdead_auth::services::{
    CookieSessionStore, DiscordIdentity, DiscordOAuth, IdentityLinking, ScaleIngestion,
    SessionOptions, SqlIdentityService, SqlScaleService,
};
use interdead_auth::AppState;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

/// Offline stand-in for Discord.
///
/// A code of the form `code-<discord id>` resolves to that account; any
/// other code fails like a rejected token exchange.
pub struct StubDiscord;

#[async_trait]
impl DiscordOAuth for StubDiscord {
    async fn exchange_code(&self, code: &str) -> Result<DiscordIdentity, AppError> {
        let discord_id = code
            .strip_prefix("code-")
            .ok_or_else(|| AppError::Upstream("invalid_grant".to_string()))?;

        Ok(DiscordIdentity {
            discord_id: discord_id.to_string(),
            username: format!("user{}", discord_id),
            display_name: format!("Ghost {}", discord_id),
            avatar_url: Some(format!(
                "https://cdn.discordapp.com/avatars/{}/abc.png",
                discord_id
            )),
        })
    }
}

/// Router plus handles into its backing store.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub pool: SqlitePool,
    pub guard: ProfileGuardRepository,
}

/// Create a test app over a fresh in-memory SQLite database.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default()).await
}

#[allow(dead_code)]
pub async fn create_test_app_with(config: Config) -> TestApp {
    let pool = db::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    db::migrate(&pool).await.expect("Failed to migrate");

    let guard = ProfileGuardRepository::new(pool.clone());
    let state = Arc::new(AppState {
        config,
        discord: Arc::new(StubDiscord),
        identity: Some(Arc::new(SqlIdentityService::new(pool.clone())) as Arc<dyn IdentityLinking>),
        scale: Some(Arc::new(SqlScaleService::new(pool.clone())) as Arc<dyn ScaleIngestion>),
        guard: Some(guard.clone()),
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        pool,
        guard,
    }
}

/// Create a test app with no persistence configured.
#[allow(dead_code)]
pub fn create_offline_app(config: Config) -> axum::Router {
    let state = Arc::new(AppState {
        config,
        discord: Arc::new(StubDiscord),
        identity: None,
        scale: None,
        guard: None,
    });
    create_router(state)
}

#[allow(dead_code)]
pub async fn send(router: &axum::Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// All `Set-Cookie` values on a response.
#[allow(dead_code)]
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Value of the `Set-Cookie` named `name`, if one was sent.
#[allow(dead_code)]
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    cookies.iter().find_map(|cookie| {
        cookie
            .strip_prefix(&prefix)
            .and_then(|rest| rest.split(';').next())
            .map(str::to_string)
    })
}

#[allow(dead_code)]
pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// Mint a session token the app will accept.
#[allow(dead_code)]
pub fn session_token(config: &Config, profile_id: &str) -> String {
    let mut store = CookieSessionStore::new(
        config.session_secret.as_deref(),
        HashMap::new(),
        SessionOptions::default(),
    );
    store
        .issue_session(&SessionProfile {
            profile_id: profile_id.to_string(),
            display_name: "Test Ghost".to_string(),
            avatar_url: None,
            username: Some("testghost".to_string()),
        })
        .unwrap()
}

/// Extract the `state` query parameter from a Discord authorize URL.
#[allow(dead_code)]
pub fn state_param(authorize_url: &str) -> String {
    let url = reqwest::Url::parse(authorize_url).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}
