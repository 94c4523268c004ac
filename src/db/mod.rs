//! Database layer (SQLite via sqlx).

pub mod guard;

pub use guard::{GuardProfileUpdate, ProfileGuardRepository};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::AppError;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS profile_guards (
        profile_id TEXT PRIMARY KEY,
        discord_id TEXT,
        discord_username TEXT,
        display_name TEXT,
        avatar_url TEXT,
        linked_at INTEGER,
        last_cleanup_at INTEGER,
        last_cleanup_timezone TEXT,
        delete_count INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_profile_guards_discord ON profile_guards(discord_id)",
    "CREATE TABLE IF NOT EXISTS profile_completed_games (
        profile_id TEXT NOT NULL,
        game_id TEXT NOT NULL,
        completed_at INTEGER NOT NULL,
        PRIMARY KEY (profile_id, game_id)
    )",
    "CREATE TABLE IF NOT EXISTS identity_profiles (
        profile_id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        display_name TEXT,
        avatar_url TEXT,
        discord_id TEXT,
        discord_username TEXT,
        discord_avatar_url TEXT,
        linked_at INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS efbd_triggers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        profile_id TEXT NOT NULL,
        axis_code TEXT NOT NULL,
        value INTEGER NOT NULL,
        source TEXT NOT NULL,
        metadata TEXT,
        recorded_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_efbd_triggers_profile ON efbd_triggers(profile_id, axis_code)",
];

/// Open a connection pool.
///
/// In-memory databases are pinned to a single connection that never
/// expires, otherwise each connection would see its own empty database.
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Database(format!("Invalid DATABASE_URL: {}", e)))?
        .create_if_missing(true);

    let pool_options = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| AppError::Database(format!("Failed to connect to database: {}", e)))?;

    tracing::info!("Connected to SQLite");
    Ok(pool)
}

/// Create tables and indexes if they do not exist yet.
pub async fn migrate(pool: &SqlitePool) -> Result<(), AppError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::debug!(statements = SCHEMA.len(), "Schema migrations applied");
    Ok(())
}
