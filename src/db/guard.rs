// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile guard repository.
//!
//! Provides typed operations for:
//! - Discord linkage (canonical profile lookup)
//! - Cleanup counters and the 24h cooldown window
//! - Completed one-shot mini-games

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::ProfileGuardRecord;
use crate::time_utils::from_epoch_millis;

/// Profile and Discord fields merged on login.
#[derive(Debug, Clone, Default)]
pub struct GuardProfileUpdate {
    pub profile_id: String,
    pub discord_id: Option<String>,
    pub discord_username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(sqlx::FromRow)]
struct GuardRow {
    profile_id: String,
    discord_id: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
    last_cleanup_at: Option<i64>,
    last_cleanup_timezone: Option<String>,
    delete_count: i64,
}

const SELECT_GUARD: &str = "SELECT profile_id, discord_id, display_name, avatar_url, \
     last_cleanup_at, last_cleanup_timezone, delete_count FROM profile_guards";

/// Guard state backed by the `profile_guards` and
/// `profile_completed_games` tables.
#[derive(Clone)]
pub struct ProfileGuardRepository {
    pool: SqlitePool,
}

impl ProfileGuardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ─── Lookups ─────────────────────────────────────────────────

    /// Get the guard record for a profile.
    pub async fn find_by_profile_id(
        &self,
        profile_id: &str,
    ) -> Result<Option<ProfileGuardRecord>, AppError> {
        let row: Option<GuardRow> =
            sqlx::query_as(&format!("{} WHERE profile_id = ?1", SELECT_GUARD))
                .bind(profile_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Find the canonical profile linked to a Discord account.
    ///
    /// The earliest linked row wins if more than one ever carried the id.
    pub async fn find_by_discord_id(
        &self,
        discord_id: &str,
    ) -> Result<Option<ProfileGuardRecord>, AppError> {
        let row: Option<GuardRow> = sqlx::query_as(&format!(
            "{} WHERE discord_id = ?1 ORDER BY linked_at ASC, rowid ASC LIMIT 1",
            SELECT_GUARD
        ))
        .bind(discord_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn hydrate(&self, row: GuardRow) -> Result<ProfileGuardRecord, AppError> {
        let completed_games: Vec<String> = sqlx::query_scalar(
            "SELECT game_id FROM profile_completed_games WHERE profile_id = ?1",
        )
        .bind(&row.profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ProfileGuardRecord {
            profile_id: row.profile_id,
            discord_id: row.discord_id,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            last_cleanup_at: row.last_cleanup_at.and_then(from_epoch_millis),
            timezone: row.last_cleanup_timezone,
            delete_count: row.delete_count,
            completed_games: completed_games.into_iter().collect(),
        })
    }

    // ─── Writes ──────────────────────────────────────────────────

    /// Create or merge a profile's Discord linkage.
    ///
    /// Absent fields keep their stored value; completed games and cleanup
    /// counters are never touched here.
    pub async fn upsert_profile(
        &self,
        update: &GuardProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let now_ms = now.timestamp_millis();
        let linked_at = update.discord_id.as_ref().map(|_| now_ms);

        sqlx::query(
            "INSERT INTO profile_guards \
                 (profile_id, discord_id, discord_username, display_name, avatar_url, \
                  linked_at, delete_count, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7) \
             ON CONFLICT(profile_id) DO UPDATE SET \
                 discord_id = COALESCE(excluded.discord_id, profile_guards.discord_id), \
                 discord_username = \
                     COALESCE(excluded.discord_username, profile_guards.discord_username), \
                 display_name = COALESCE(excluded.display_name, profile_guards.display_name), \
                 avatar_url = COALESCE(excluded.avatar_url, profile_guards.avatar_url), \
                 linked_at = COALESCE(profile_guards.linked_at, excluded.linked_at), \
                 updated_at = excluded.updated_at",
        )
        .bind(&update.profile_id)
        .bind(&update.discord_id)
        .bind(&update.discord_username)
        .bind(&update.display_name)
        .bind(&update.avatar_url)
        .bind(linked_at)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;

        tracing::debug!(profile_id = %update.profile_id, "Profile guard upserted");
        Ok(())
    }

    /// Record a profile cleanup: bump the counter, stamp the time and
    /// timezone, and forget completed games. Returns the new counter.
    pub async fn record_cleanup(
        &self,
        profile_id: &str,
        timezone: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let now_ms = now.timestamp_millis();
        let mut tx = self.pool.begin().await?;

        let delete_count: i64 = sqlx::query_scalar(
            "INSERT INTO profile_guards \
                 (profile_id, last_cleanup_at, last_cleanup_timezone, delete_count, updated_at) \
             VALUES (?1, ?2, ?3, 1, ?2) \
             ON CONFLICT(profile_id) DO UPDATE SET \
                 delete_count = profile_guards.delete_count + 1, \
                 last_cleanup_at = excluded.last_cleanup_at, \
                 last_cleanup_timezone = COALESCE( \
                     excluded.last_cleanup_timezone, \
                     profile_guards.last_cleanup_timezone), \
                 updated_at = excluded.updated_at \
             RETURNING delete_count",
        )
        .bind(profile_id)
        .bind(now_ms)
        .bind(timezone)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM profile_completed_games WHERE profile_id = ?1")
            .bind(profile_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(profile_id, delete_count, "Profile cleanup recorded");
        Ok(delete_count)
    }

    /// Add a game to the profile's completed set.
    pub async fn mark_completed(
        &self,
        profile_id: &str,
        game_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let now_ms = now.timestamp_millis();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO profile_guards (profile_id, delete_count, updated_at) \
             VALUES (?1, 0, ?2) ON CONFLICT(profile_id) DO NOTHING",
        )
        .bind(profile_id)
        .bind(now_ms)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT OR IGNORE INTO profile_completed_games (profile_id, game_id, completed_at) \
             VALUES (?1, ?2, ?3)",
        )
        .bind(profile_id)
        .bind(game_id)
        .bind(now_ms)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Forget every completed game for a profile.
    pub async fn clear_completed(&self, profile_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM profile_completed_games WHERE profile_id = ?1")
            .bind(profile_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Zero the cleanup counter once the cooldown window has passed.
    pub async fn reset_cleanup_window(
        &self,
        profile_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE profile_guards SET delete_count = 0, updated_at = ?2 WHERE profile_id = ?1",
        )
        .bind(profile_id)
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        tracing::info!(profile_id, "Cleanup window reset");
        Ok(())
    }

    /// Gate a sensitive operation on the cleanup cooldown.
    ///
    /// Fails with `CleanupBlocked` while cooling down, lazily resets an
    /// elapsed window, and returns the (possibly reset) record.
    ///
    /// NOTE: the read and the reset are separate statements, so this is not
    /// atomic. A request that observed the elapsed window can zero the
    /// counter after a concurrent `record_cleanup` has already bumped it,
    /// and that increment is lost. Tolerated because a profile is normally
    /// driven by one user at a time.
    pub async fn enforce_cleanup_window(
        &self,
        profile_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ProfileGuardRecord>, AppError> {
        let Some(mut record) = self.find_by_profile_id(profile_id).await? else {
            return Ok(None);
        };

        if record.is_cleanup_blocked(now) {
            tracing::warn!(
                profile_id,
                delete_count = record.delete_count,
                "Profile blocked by cleanup cooldown"
            );
            return Err(AppError::CleanupBlocked {
                retry_after_secs: record.retry_after_secs(now),
            });
        }

        if record.cleanup_window_elapsed(now) {
            self.reset_cleanup_window(profile_id, now).await?;
            record.delete_count = 0;
        }

        Ok(Some(record))
    }
}
