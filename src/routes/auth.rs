// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Discord OAuth, session status, logout and profile cleanup routes.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::GuardProfileUpdate;
use crate::error::{AppError, Result};
use crate::models::{DiscordLink, OAuthStatePayload, ProfileMetadata, SessionProfile};
use crate::routes::{attach_cookies, found, no_store};
use crate::services::signer::timing_safe_eq;
use crate::services::{CookieSessionStore, SESSION_COOKIE, STATE_COOKIE};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

const DISCORD_AUTHORIZE_URL: &str = "https://discord.com/api/oauth2/authorize";

/// Header the client may use to report its IANA timezone on cleanup.
pub const TIMEZONE_HEADER: &str = "x-timezone";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/discord/start", get(discord_start))
        .route("/auth/discord/callback", get(discord_callback))
        .route("/auth/session", get(session_status))
        .route("/auth/profile/cleanup", post(profile_cleanup))
        .route("/auth/logout", post(logout))
}

/// Query parameters for starting the OAuth flow.
#[derive(Debug, Default, Deserialize)]
pub struct StartParams {
    /// Where to land after login; relative paths resolve against the site.
    #[serde(default)]
    pub redirect: Option<String>,
}

/// Query parameters Discord sends back to the callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionStatusResponse {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CleanupRequest {
    #[serde(default)]
    timezone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CleanupResponse {
    success: bool,
    profile_id: String,
    delete_count: i64,
    last_cleanup_at: String,
    timezone: Option<String>,
}

/// Per-request Discord login controller.
///
/// Owns the request's cookie view; queued cookies are attached by the
/// route handlers once the outcome is known.
pub struct DiscordAuthController {
    state: Arc<AppState>,
    session: CookieSessionStore,
}

impl DiscordAuthController {
    pub fn new(state: Arc<AppState>, jar: &CookieJar) -> Self {
        let session = CookieSessionStore::from_jar(&state.config, jar);
        Self { state, session }
    }

    /// Attach every queued cookie to `response`.
    pub fn finish(&mut self, response: Response) -> Response {
        attach_cookies(response, self.session.collect_cookies())
    }

    /// Sign a fresh OAuth state, store it in a cookie and redirect to
    /// Discord's authorize endpoint.
    pub async fn build_start_redirect(&mut self, redirect: Option<&str>) -> Result<Response> {
        let state = Arc::clone(&self.state);
        let config = &state.config;

        let (Some(client_id), Some(redirect_uri)) = (
            config.discord_client_id.as_deref(),
            config.discord_redirect_uri.as_deref(),
        ) else {
            return Err(AppError::ServiceUnavailable(
                "Missing Discord credentials".to_string(),
            ));
        };

        let now = Utc::now();
        let profile_id = match self.session.read_session(false) {
            Some(session) => session.profile_id,
            None => Uuid::new_v4().to_string(),
        };

        if let Some(guard) = &state.guard {
            guard.enforce_cleanup_window(&profile_id, now).await?;
        }

        let payload = OAuthStatePayload {
            redirect: redirect
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or("/")
                .to_string(),
            profile_id,
            issued_at: now.timestamp_millis(),
            nonce: Some(generate_nonce()?),
        };

        if let Some(identity) = &state.identity {
            identity
                .begin_discord_login(&payload.profile_id, &payload)
                .await?;
        }

        let token = self.session.set(STATE_COOKIE, &payload)?;

        let authorize_url = format!(
            "{}?client_id={}&response_type=code&scope=identify&redirect_uri={}&state={}",
            DISCORD_AUTHORIZE_URL,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&token),
        );

        tracing::info!(profile_id = %payload.profile_id, "Redirecting to Discord authorization");
        Ok(found(&authorize_url))
    }

    /// Validate the returned state, exchange the code, link the Discord
    /// account to its canonical profile and issue a session.
    pub async fn handle_callback(&mut self, params: CallbackParams) -> Result<Response> {
        let state = Arc::clone(&self.state);

        if let Some(error) = params.error.filter(|e| !e.is_empty()) {
            tracing::warn!(error = %error, "Discord reported an authorization error");
            self.session.delete(STATE_COOKIE);
            let target = format!(
                "{}/?auth_error={}",
                state.config.site_base_url.trim_end_matches('/'),
                urlencoding::encode(&error)
            );
            return Ok(found(&target));
        }

        let (Some(code), Some(state_param)) = (
            params.code.filter(|c| !c.is_empty()),
            params.state.filter(|s| !s.is_empty()),
        ) else {
            return Err(AppError::BadRequest("Missing code or state".to_string()));
        };

        let oauth_state = self.validate_state(&state_param)?;

        let identity = state
            .identity
            .clone()
            .ok_or_else(|| {
                AppError::ServiceUnavailable("Identity service not configured".to_string())
            })?;

        let discord = state.discord.exchange_code(&code).await?;
        let now = Utc::now();

        let mut profile_id = oauth_state.profile_id.clone();
        let mut transient_profile = None;

        if let Some(guard) = &state.guard {
            if let Some(canonical) = guard.find_by_discord_id(&discord.discord_id).await? {
                if canonical.profile_id != profile_id {
                    tracing::info!(
                        transient = %profile_id,
                        canonical = %canonical.profile_id,
                        "Discord account already linked; using canonical profile"
                    );
                    transient_profile =
                        Some(std::mem::replace(&mut profile_id, canonical.profile_id));
                }
            }

            guard.enforce_cleanup_window(&profile_id, now).await?;
        }

        let metadata = ProfileMetadata {
            display_name: discord.display_name.clone(),
            avatar_url: discord.avatar_url.clone(),
        };
        let link = DiscordLink {
            discord_id: discord.discord_id.clone(),
            username: discord.username.clone(),
            avatar_url: discord.avatar_url.clone(),
            linked_at: now,
        };

        let aggregate = identity
            .complete_discord_login(&profile_id, &metadata, &link)
            .await?;
        let linked = aggregate.discord_link.unwrap_or(link);

        if let Some(guard) = &state.guard {
            guard
                .upsert_profile(
                    &GuardProfileUpdate {
                        profile_id: aggregate.profile_id.clone(),
                        discord_id: Some(linked.discord_id.clone()),
                        discord_username: Some(linked.username.clone()),
                        display_name: Some(aggregate.metadata.display_name.clone()),
                        avatar_url: aggregate.metadata.avatar_url.clone(),
                    },
                    now,
                )
                .await?;
        }

        if let Some(transient) = transient_profile {
            if let Err(e) = identity.delete_profile(&transient).await {
                tracing::warn!(
                    profile_id = %transient,
                    error = %e,
                    "Failed to delete transient profile"
                );
            }
        }

        self.session.delete(STATE_COOKIE);
        self.session.issue_session(&SessionProfile {
            profile_id: aggregate.profile_id.clone(),
            display_name: aggregate.metadata.display_name,
            avatar_url: aggregate.metadata.avatar_url,
            username: Some(linked.username),
        })?;

        tracing::info!(profile_id = %aggregate.profile_id, "Discord login completed");

        let target = resolve_redirect(&oauth_state.redirect, &state.config.site_base_url);
        Ok(found(&target))
    }

    /// Report the current session, refreshing its cookie.
    pub fn handle_session_status(&mut self) -> Response {
        let body = match self.session.read_session(true) {
            Some(session) => SessionStatusResponse {
                authenticated: true,
                profile_id: Some(session.profile_id),
                display_name: Some(session.display_name),
                avatar_url: session.avatar_url,
                username: session.username,
            },
            None => SessionStatusResponse {
                authenticated: false,
                profile_id: None,
                display_name: None,
                avatar_url: None,
                username: None,
            },
        };

        no_store(Json(body).into_response())
    }

    /// Delete the caller's identity data and count the cleanup against the
    /// cooldown window.
    pub async fn handle_cleanup(&mut self, headers: &HeaderMap, body: &[u8]) -> Result<Response> {
        let state = Arc::clone(&self.state);

        let session = self.session.read_session(false).ok_or(AppError::Unauthorized)?;
        let timezone = resolve_timezone(headers, body);

        let identity = state
            .identity
            .clone()
            .ok_or_else(|| {
                AppError::ServiceUnavailable("Identity service not configured".to_string())
            })?;
        let guard = state
            .guard
            .clone()
            .ok_or_else(|| {
                AppError::ServiceUnavailable("Profile guard not configured".to_string())
            })?;

        let profile_id = session.profile_id;
        let now = Utc::now();

        guard.enforce_cleanup_window(&profile_id, now).await?;
        identity.delete_profile(&profile_id).await?;

        let delete_count = guard
            .record_cleanup(&profile_id, timezone.as_deref(), now)
            .await?;

        let persisted = guard.find_by_profile_id(&profile_id).await?;
        let verified = persisted.as_ref().is_some_and(|record| {
            record.delete_count == delete_count
                && record.last_cleanup_at.map(|t| t.timestamp_millis())
                    == Some(now.timestamp_millis())
        });
        if !verified {
            tracing::error!(
                profile_id = %profile_id,
                delete_count,
                "Cleanup write did not persist"
            );
            return Err(AppError::Database("Cleanup was not persisted".to_string()));
        }

        self.session.delete(SESSION_COOKIE);

        Ok(Json(CleanupResponse {
            success: true,
            profile_id,
            delete_count,
            last_cleanup_at: format_utc_rfc3339(now),
            timezone,
        })
        .into_response())
    }

    /// Clear the session cookie.
    pub fn handle_logout(&mut self) -> Response {
        self.session.delete(SESSION_COOKIE);
        StatusCode::NO_CONTENT.into_response()
    }

    /// The state query parameter must equal the state cookie byte-for-byte,
    /// carry a valid signature and still be within its TTL.
    fn validate_state(&self, state_param: &str) -> Result<OAuthStatePayload> {
        let Some(cookie) = self.session.get_raw(STATE_COOKIE) else {
            tracing::warn!("OAuth callback without a state cookie");
            return Err(AppError::InvalidState);
        };

        if !timing_safe_eq(cookie, state_param) {
            tracing::warn!("OAuth state mismatch! Potential CSRF attack");
            return Err(AppError::InvalidState);
        }

        let payload: OAuthStatePayload = self.session.decode_as(state_param).map_err(|e| {
            tracing::warn!(error = %e, "OAuth state failed verification");
            AppError::InvalidState
        })?;

        let age_ms = Utc::now().timestamp_millis() - payload.issued_at;
        let ttl_ms = i64::try_from(self.state.config.state_ttl_seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        if age_ms > ttl_ms {
            tracing::warn!(age_ms, "OAuth state expired");
            return Err(AppError::InvalidState);
        }

        Ok(payload)
    }
}

/// Resolve a post-login target against the site base URL. Absolute
/// http(s) URLs pass through unchanged.
pub fn resolve_redirect(target: &str, site_base_url: &str) -> String {
    let target = target.trim();
    if reqwest::Url::parse(target).is_ok_and(|url| matches!(url.scheme(), "http" | "https")) {
        return target.to_string();
    }

    let base = site_base_url.trim_end_matches('/');
    if target.starts_with('/') {
        format!("{}{}", base, target)
    } else {
        format!("{}/{}", base, target)
    }
}

/// `X-Timezone` wins over a `timezone` field in the JSON body.
fn resolve_timezone(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    let from_header = headers
        .get(TIMEZONE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|tz| !tz.is_empty())
        .map(str::to_string);

    from_header.or_else(|| {
        serde_json::from_slice::<CleanupRequest>(body)
            .ok()
            .and_then(|request| request.timezone)
            .map(|tz| tz.trim().to_string())
            .filter(|tz| !tz.is_empty())
    })
}

fn generate_nonce() -> Result<String> {
    let mut bytes = [0u8; 16];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate OAuth nonce")))?;
    Ok(hex::encode(bytes))
}

// ─── Handlers ────────────────────────────────────────────────────

async fn discord_start(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<StartParams>,
) -> Response {
    let mut controller = DiscordAuthController::new(state, &jar);
    match controller.build_start_redirect(params.redirect.as_deref()).await {
        Ok(response) => controller.finish(response),
        Err(e) => e.into_response(),
    }
}

/// Cookies are only attached on success so a failed callback never leaves
/// a half-issued session behind.
async fn discord_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let mut controller = DiscordAuthController::new(state, &jar);
    match controller.handle_callback(params).await {
        Ok(response) => controller.finish(response),
        Err(e) => e.into_response(),
    }
}

async fn session_status(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let mut controller = DiscordAuthController::new(state, &jar);
    let response = controller.handle_session_status();
    controller.finish(response)
}

async fn profile_cleanup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut controller = DiscordAuthController::new(state, &jar);
    match controller.handle_cleanup(&headers, &body).await {
        Ok(response) => controller.finish(response),
        Err(e) => e.into_response(),
    }
}

async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let mut controller = DiscordAuthController::new(state, &jar);
    let response = controller.handle_logout();
    controller.finish(response)
}
