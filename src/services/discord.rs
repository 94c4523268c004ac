// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Discord OAuth client.
//!
//! Handles:
//! - Authorization code exchange
//! - Fetching the authenticated user (`/users/@me`)
//! - Rate limit detection

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Config;
use crate::error::AppError;

/// Discord user as the rest of the service sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscordIdentity {
    pub discord_id: String,
    pub username: String,
    /// Global display name, falling back to the username.
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Exchanges an authorization code for the Discord account behind it.
#[async_trait]
pub trait DiscordOAuth: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<DiscordIdentity, AppError>;
}

/// Discord API client.
#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    api_base_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
}

impl DiscordClient {
    /// Create a new Discord client with OAuth credentials.
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        redirect_uri: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base_url: "https://discord.com/api".to_string(),
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.discord_client_id.clone(),
            config.discord_client_secret.clone(),
            config.discord_redirect_uri.clone(),
        )
    }

    /// Point the client at a different API host (local mocks).
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    /// Exchange an authorization code for an access token.
    async fn exchange_token(&self, code: &str) -> Result<TokenResponse, AppError> {
        let (Some(client_id), Some(client_secret), Some(redirect_uri)) = (
            self.client_id.as_deref(),
            self.client_secret.as_deref(),
            self.redirect_uri.as_deref(),
        ) else {
            return Err(AppError::ServiceUnavailable(
                "Missing Discord credentials".to_string(),
            ));
        };

        let response = self
            .http
            .post(format!("{}/oauth2/token", self.api_base_url))
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Token exchange request failed: {}", e)))?;

        check_response_json(response).await
    }

    /// Get the user that owns `access_token`.
    async fn get_current_user(&self, access_token: &str) -> Result<DiscordUser, AppError> {
        let response = self
            .http
            .get(format!("{}/users/@me", self.api_base_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        check_response_json(response).await
    }
}

#[async_trait]
impl DiscordOAuth for DiscordClient {
    async fn exchange_code(&self, code: &str) -> Result<DiscordIdentity, AppError> {
        let token = self.exchange_token(code).await?;
        let user = self.get_current_user(&token.access_token).await?;

        tracing::debug!(discord_id = %user.id, "Fetched Discord user");

        Ok(user.into_identity())
    }
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Discord rate limit hit (429)");
            return Err(AppError::Upstream("Discord rate limit exceeded".to_string()));
        }

        return Err(AppError::Upstream(format!("HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Upstream(format!("JSON parse error: {}", e)))
}

/// Token response from Discord.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// `/users/@me` response.
#[derive(Debug, Clone, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
}

impl DiscordUser {
    fn into_identity(self) -> DiscordIdentity {
        let avatar_url = self
            .avatar
            .as_ref()
            .map(|hash| format!("https://cdn.discordapp.com/avatars/{}/{}.png", self.id, hash));
        let display_name = self
            .global_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.username.clone());

        DiscordIdentity {
            discord_id: self.id,
            username: self.username,
            display_name,
            avatar_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_uses_global_name_and_avatar() {
        let user: DiscordUser = serde_json::from_value(serde_json::json!({
            "id": "80351110224678912",
            "username": "nelly",
            "global_name": "Nelly 🌙",
            "avatar": "8342729096ea3675442027381ff50dfe"
        }))
        .unwrap();

        let identity = user.into_identity();
        assert_eq!(identity.display_name, "Nelly 🌙");
        assert_eq!(
            identity.avatar_url.as_deref(),
            Some("https://cdn.discordapp.com/avatars/80351110224678912/8342729096ea3675442027381ff50dfe.png")
        );
    }

    #[test]
    fn test_identity_falls_back_to_username() {
        let user: DiscordUser = serde_json::from_value(serde_json::json!({
            "id": "1",
            "username": "nelly",
            "global_name": null,
            "avatar": null
        }))
        .unwrap();

        let identity = user.into_identity();
        assert_eq!(identity.display_name, "nelly");
        assert_eq!(identity.avatar_url, None);
    }

    #[tokio::test]
    async fn test_missing_credentials_is_unavailable() {
        let client = DiscordClient::new(Some("id".into()), None, Some("cb".into()));
        let result = client.exchange_code("code").await;
        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
    }

    /// Serve a fake Discord API on an ephemeral port.
    async fn mock_discord(token_status: u16) -> String {
        use axum::{http::StatusCode, routing::{get, post}, Json, Router};

        let app = Router::new()
            .route(
                "/oauth2/token",
                post(move |body: String| async move {
                    assert!(body.contains("grant_type=authorization_code"));
                    assert!(body.contains("code=good-code"));
                    (
                        StatusCode::from_u16(token_status).unwrap(),
                        Json(serde_json::json!({"access_token": "tok", "token_type": "Bearer"})),
                    )
                }),
            )
            .route(
                "/users/@me",
                get(|headers: axum::http::HeaderMap| async move {
                    assert_eq!(headers.get("authorization").unwrap(), "Bearer tok");
                    Json(serde_json::json!({"id": "42", "username": "ghost", "avatar": null}))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base: String) -> DiscordClient {
        DiscordClient::new(
            Some("id".into()),
            Some("secret".into()),
            Some("https://api.test/cb".into()),
        )
        .with_api_base_url(base)
    }

    #[tokio::test]
    async fn test_exchange_code_against_mock() {
        let identity = client(mock_discord(200).await)
            .exchange_code("good-code")
            .await
            .unwrap();

        assert_eq!(identity.discord_id, "42");
        assert_eq!(identity.display_name, "ghost");
        assert_eq!(identity.avatar_url, None);
    }

    #[tokio::test]
    async fn test_rejected_exchange_is_upstream_error() {
        let result = client(mock_discord(400).await)
            .exchange_code("good-code")
            .await;
        assert!(matches!(result, Err(AppError::Upstream(_))));

        let result = client(mock_discord(429).await)
            .exchange_code("good-code")
            .await;
        assert!(matches!(result, Err(AppError::Upstream(msg)) if msg.contains("rate limit")));
    }
}
