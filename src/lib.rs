// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! InterDead auth: edge session & identity-linking backend
//!
//! This crate provides the HTTP API behind the InterDead site: Discord
//! OAuth login with signed-cookie sessions, profile cleanup with abuse
//! guards, and EFBD trigger-scale ingestion.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::ProfileGuardRepository;
use services::{DiscordOAuth, IdentityLinking, ScaleIngestion};
use std::sync::Arc;

/// Shared application state.
///
/// Collaborators are optional: without a database the service still
/// starts, and the endpoints that need them answer 503.
pub struct AppState {
    pub config: Config,
    pub discord: Arc<dyn DiscordOAuth>,
    pub identity: Option<Arc<dyn IdentityLinking>>,
    pub scale: Option<Arc<dyn ScaleIngestion>>,
    pub guard: Option<ProfileGuardRepository>,
}
