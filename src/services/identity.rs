// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity linking: profiles and their Discord accounts.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::{DiscordLink, OAuthStatePayload, ProfileAggregate, ProfileMetadata};
use crate::time_utils::from_epoch_millis;

/// Logins that never reach the callback leave a pending row behind; rows
/// older than this are pruned when the next login starts.
pub const PENDING_LOGIN_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Identity-core operations the auth controller relies on.
#[async_trait]
pub trait IdentityLinking: Send + Sync {
    /// Note that a Discord login was started for `profile_id`.
    async fn begin_discord_login(
        &self,
        profile_id: &str,
        state: &OAuthStatePayload,
    ) -> Result<(), AppError>;

    /// Attach a Discord account to `profile_id` and return the linked profile.
    async fn complete_discord_login(
        &self,
        profile_id: &str,
        metadata: &ProfileMetadata,
        discord_link: &DiscordLink,
    ) -> Result<ProfileAggregate, AppError>;

    /// Remove the identity record for `profile_id`. Missing records are not
    /// an error.
    async fn delete_profile(&self, profile_id: &str) -> Result<(), AppError>;
}

/// `IdentityLinking` backed by the `identity_profiles` table.
#[derive(Clone)]
pub struct SqlIdentityService {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    profile_id: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    discord_id: Option<String>,
    discord_username: Option<String>,
    discord_avatar_url: Option<String>,
    linked_at: Option<i64>,
}

impl SqlIdentityService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a profile by ID.
    pub async fn get_profile(
        &self,
        profile_id: &str,
    ) -> Result<Option<ProfileAggregate>, AppError> {
        let row: Option<IdentityRow> = sqlx::query_as(
            "SELECT profile_id, display_name, avatar_url, discord_id, discord_username, \
                    discord_avatar_url, linked_at \
             FROM identity_profiles WHERE profile_id = ?1",
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let discord_link = match (row.discord_id, row.discord_username, row.linked_at) {
                (Some(discord_id), Some(username), Some(linked_at)) => {
                    from_epoch_millis(linked_at).map(|linked_at| DiscordLink {
                        discord_id,
                        username,
                        avatar_url: row.discord_avatar_url,
                        linked_at,
                    })
                }
                _ => None,
            };

            ProfileAggregate {
                profile_id: row.profile_id,
                metadata: ProfileMetadata {
                    display_name: row.display_name.unwrap_or_default(),
                    avatar_url: row.avatar_url,
                },
                discord_link,
            }
        }))
    }
}

#[async_trait]
impl IdentityLinking for SqlIdentityService {
    async fn begin_discord_login(
        &self,
        profile_id: &str,
        state: &OAuthStatePayload,
    ) -> Result<(), AppError> {
        let now_ms = Utc::now().timestamp_millis();

        let pruned = sqlx::query(
            "DELETE FROM identity_profiles WHERE status = 'pending' AND created_at < ?1",
        )
        .bind(now_ms - PENDING_LOGIN_TTL_MS)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned abandoned pending logins");
        }

        sqlx::query(
            "INSERT INTO identity_profiles (profile_id, status, created_at, updated_at) \
             VALUES (?1, 'pending', ?2, ?2) ON CONFLICT(profile_id) DO NOTHING",
        )
        .bind(profile_id)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;

        tracing::debug!(profile_id, redirect = %state.redirect, "Discord login started");
        Ok(())
    }

    async fn complete_discord_login(
        &self,
        profile_id: &str,
        metadata: &ProfileMetadata,
        discord_link: &DiscordLink,
    ) -> Result<ProfileAggregate, AppError> {
        let now_ms = Utc::now().timestamp_millis();

        sqlx::query(
            "INSERT INTO identity_profiles \
                 (profile_id, status, display_name, avatar_url, discord_id, discord_username, \
                  discord_avatar_url, linked_at, created_at, updated_at) \
             VALUES (?1, 'linked', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8) \
             ON CONFLICT(profile_id) DO UPDATE SET \
                 status = 'linked', \
                 display_name = excluded.display_name, \
                 avatar_url = excluded.avatar_url, \
                 discord_id = excluded.discord_id, \
                 discord_username = excluded.discord_username, \
                 discord_avatar_url = excluded.discord_avatar_url, \
                 linked_at = COALESCE(identity_profiles.linked_at, excluded.linked_at), \
                 updated_at = excluded.updated_at",
        )
        .bind(profile_id)
        .bind(&metadata.display_name)
        .bind(&metadata.avatar_url)
        .bind(&discord_link.discord_id)
        .bind(&discord_link.username)
        .bind(&discord_link.avatar_url)
        .bind(discord_link.linked_at.timestamp_millis())
        .bind(now_ms)
        .execute(&self.pool)
        .await?;

        self.get_profile(profile_id).await?.ok_or_else(|| {
            AppError::Database(format!("Profile {} missing after link", profile_id))
        })
    }

    async fn delete_profile(&self, profile_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM identity_profiles WHERE profile_id = ?1")
            .bind(profile_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            profile_id,
            deleted = result.rows_affected(),
            "Identity profile deleted"
        );
        Ok(())
    }
}
