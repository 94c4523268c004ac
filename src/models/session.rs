//! Payloads carried inside signed cookies.

use serde::{Deserialize, Serialize};

/// Body of the `interdead_session` cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub profile_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Epoch milliseconds
    pub issued_at: i64,
}

/// Profile fields a session is minted from.
#[derive(Debug, Clone, Default)]
pub struct SessionProfile {
    pub profile_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub username: Option<String>,
}

/// Body of the `discord_oauth_state` cookie, also sent to Discord as `state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthStatePayload {
    /// Where to send the browser once login completes.
    pub redirect: String,
    /// Profile the login was started from (session profile or a fresh UUID).
    pub profile_id: String,
    /// Epoch milliseconds
    pub issued_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}
