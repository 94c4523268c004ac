// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed-cookie session store.
//!
//! Tokens have the form `base64url(payload) "." base64url(hmac)`. The store
//! is built fresh for every request from that request's cookies and queues
//! `Set-Cookie` values for the response; nothing is shared across requests.

use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::config::{Config, DEFAULT_SESSION_TTL_SECONDS, DEFAULT_STATE_TTL_SECONDS};
use crate::models::{SessionPayload, SessionProfile};
use crate::services::signer::Signer;

/// Cookie holding the single-use OAuth state token.
pub const STATE_COOKIE: &str = "discord_oauth_state";
/// Cookie holding the signed session.
pub const SESSION_COOKIE: &str = "interdead_session";

/// Token encode/decode failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session signing key is missing")]
    MissingKey,

    #[error("Invalid token format")]
    InvalidFormat,

    #[error("Token signature mismatch")]
    SignatureMismatch,

    #[error("Token payload is not valid base64url UTF-8")]
    Encoding,

    #[error("Token payload JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Cookie lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub state_ttl_seconds: u64,
    pub session_ttl_seconds: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            state_ttl_seconds: DEFAULT_STATE_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }
}

/// Per-request view over the signed cookies.
pub struct CookieSessionStore {
    signer: Signer,
    cookies: HashMap<String, String>,
    pending_cookies: Vec<String>,
    options: SessionOptions,
}

impl CookieSessionStore {
    pub fn new(
        secret: Option<&[u8]>,
        cookies: HashMap<String, String>,
        options: SessionOptions,
    ) -> Self {
        Self {
            signer: Signer::new(secret),
            cookies,
            pending_cookies: Vec::new(),
            options,
        }
    }

    /// Build a store from the request's cookie jar.
    pub fn from_jar(config: &Config, jar: &CookieJar) -> Self {
        let cookies = jar
            .iter()
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect();

        Self::new(
            config.session_secret.as_deref(),
            cookies,
            SessionOptions {
                state_ttl_seconds: config.state_ttl_seconds,
                session_ttl_seconds: config.session_ttl_seconds,
            },
        )
    }

    // ─── Token Codec ─────────────────────────────────────────────

    /// Serialize, base64url-encode and sign a value. Strings are stored
    /// verbatim rather than JSON-quoted.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, SessionError> {
        let serialized = match serde_json::to_value(value)? {
            Value::String(raw) => raw,
            other => other.to_string(),
        };
        let encoded = URL_SAFE_NO_PAD.encode(serialized.as_bytes());
        let signature = self
            .signer
            .sign(&encoded)
            .ok_or(SessionError::MissingKey)?;
        Ok(format!("{}.{}", encoded, signature))
    }

    /// Verify and decode a token. Payloads that are not JSON come back as
    /// `Value::String`.
    pub fn decode(&self, token: &str) -> Result<Value, SessionError> {
        let (encoded, signature) = match token.split('.').collect::<Vec<_>>()[..] {
            [encoded, signature] if !encoded.is_empty() && !signature.is_empty() => {
                (encoded, signature)
            }
            _ => return Err(SessionError::InvalidFormat),
        };

        if !self.signer.verify(encoded, signature) {
            return Err(SessionError::SignatureMismatch);
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| SessionError::Encoding)?;
        let decoded = String::from_utf8(bytes).map_err(|_| SessionError::Encoding)?;

        Ok(serde_json::from_str(&decoded).unwrap_or(Value::String(decoded)))
    }

    /// Decode a token into a typed payload.
    pub fn decode_as<T: DeserializeOwned>(&self, token: &str) -> Result<T, SessionError> {
        Ok(serde_json::from_value(self.decode(token)?)?)
    }

    // ─── Generic Slots ───────────────────────────────────────────

    /// Sign `value` into `key` with the state TTL. Returns the token.
    pub fn set<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<String, SessionError> {
        self.store_and_encode(key, value, self.options.state_ttl_seconds)
    }

    /// Decoded value of `key`; invalid tokens read as absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        let raw = self.cookies.get(key)?;
        self.decode(raw).ok()
    }

    /// The undecoded token currently held for `key`.
    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.cookies.get(key).map(String::as_str)
    }

    /// Drop `key` and queue a tombstone cookie.
    pub fn delete(&mut self, key: &str) {
        self.cookies.remove(key);
        self.pending_cookies.push(build_cookie(key, "deleted", 0));
    }

    // ─── Session Slot ────────────────────────────────────────────

    /// Current session, if the cookie is present and valid. With `refresh`
    /// a new token with the same payload and a renewed TTL is queued.
    pub fn read_session(&mut self, refresh: bool) -> Option<SessionPayload> {
        let raw = self.cookies.get(SESSION_COOKIE)?;
        let session: SessionPayload = match self.decode_as(raw) {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid session cookie");
                return None;
            }
        };

        if refresh {
            if let Err(e) =
                self.store_and_encode(SESSION_COOKIE, &session, self.options.session_ttl_seconds)
            {
                tracing::warn!(error = %e, "Failed to refresh session cookie");
            }
        }

        Some(session)
    }

    /// Mint a new session token for `profile`.
    pub fn issue_session(&mut self, profile: &SessionProfile) -> Result<String, SessionError> {
        let payload = SessionPayload {
            profile_id: profile.profile_id.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            username: profile.username.clone(),
            issued_at: chrono::Utc::now().timestamp_millis(),
        };
        self.store_and_encode(SESSION_COOKIE, &payload, self.options.session_ttl_seconds)
    }

    /// Drain the `Set-Cookie` values queued during this request.
    pub fn collect_cookies(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_cookies)
    }

    fn store_and_encode<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> Result<String, SessionError> {
        let encoded = self.encode(value)?;
        self.cookies.insert(key.to_string(), encoded.clone());
        self.pending_cookies.push(build_cookie(key, &encoded, ttl_seconds));
        Ok(encoded)
    }
}

fn build_cookie(name: &str, value: &str, max_age: u64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={}",
        name, value, max_age
    )
}
