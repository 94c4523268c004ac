// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! InterDead auth API server
//!
//! Discord login, signed-cookie sessions, profile cleanup and EFBD
//! trigger ingestion for the InterDead site.

use interdead_auth::{
    config::Config,
    db::{self, ProfileGuardRepository},
    services::{DiscordClient, IdentityLinking, ScaleIngestion, SqlIdentityService, SqlScaleService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting InterDead auth API");

    if !config.discord_configured() {
        tracing::warn!("Discord credentials missing; /auth/discord/start will answer 503");
    }
    if config.session_secret.is_none() {
        tracing::warn!("SESSION_SECRET missing; sessions cannot be issued");
    }

    // Persistence is optional; without it the collaborators report 503
    let (identity, scale, guard) = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::connect(url).await?;
            db::migrate(&pool).await?;
            tracing::info!("Database connected and migrated");

            (
                Some(Arc::new(SqlIdentityService::new(pool.clone())) as Arc<dyn IdentityLinking>),
                Some(Arc::new(SqlScaleService::new(pool.clone())) as Arc<dyn ScaleIngestion>),
                Some(ProfileGuardRepository::new(pool)),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set; identity, scale and guard are disabled");
            (None, None, None)
        }
    };

    let discord = Arc::new(DiscordClient::from_config(&config));

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        discord,
        identity,
        scale,
        guard,
    });

    // Build router
    let app = interdead_auth::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("interdead_auth=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
