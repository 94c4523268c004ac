// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile, Discord linkage and abuse-guard models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Cleanups allowed inside one window before the profile cools down.
pub const MAX_CLEANUPS_PER_WINDOW: i64 = 2;

/// Length of the cleanup cooldown window.
pub fn cleanup_window() -> Duration {
    Duration::hours(24)
}

/// Public profile fields shown on the site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetadata {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Link between a profile and a Discord account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordLink {
    pub discord_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub linked_at: DateTime<Utc>,
}

/// Profile as returned by the identity service after linking.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileAggregate {
    pub profile_id: String,
    pub metadata: ProfileMetadata,
    pub discord_link: Option<DiscordLink>,
}

/// Per-profile abuse-prevention state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileGuardRecord {
    pub profile_id: String,
    pub discord_id: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub last_cleanup_at: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub delete_count: i64,
    pub completed_games: BTreeSet<String>,
}

impl ProfileGuardRecord {
    /// Empty record for a profile the guard has never seen.
    pub fn new(profile_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            discord_id: None,
            display_name: None,
            avatar_url: None,
            last_cleanup_at: None,
            timezone: None,
            delete_count: 0,
            completed_games: BTreeSet::new(),
        }
    }

    /// Blocked iff more than two cleanups happened and the last one is
    /// less than 24h old.
    pub fn is_cleanup_blocked(&self, now: DateTime<Utc>) -> bool {
        if self.delete_count <= MAX_CLEANUPS_PER_WINDOW {
            return false;
        }
        match self.last_cleanup_at {
            Some(last) => now - last < cleanup_window(),
            None => false,
        }
    }

    /// True once the window since the last cleanup has fully elapsed and
    /// there are counters left to zero.
    pub fn cleanup_window_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.last_cleanup_at {
            Some(last) => self.delete_count > 0 && now - last >= cleanup_window(),
            None => false,
        }
    }

    /// Seconds until a blocked profile may clean up again.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        self.last_cleanup_at
            .map(|last| (last + cleanup_window() - now).num_seconds().max(0))
            .unwrap_or(0)
    }

    pub fn has_completed(&self, game_id: &str) -> bool {
        self.completed_games.contains(game_id)
    }
}
