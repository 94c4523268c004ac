// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod discord;
pub mod identity;
pub mod scale;
pub mod session;
pub mod signer;

pub use discord::{DiscordClient, DiscordIdentity, DiscordOAuth};
pub use identity::{IdentityLinking, SqlIdentityService};
pub use scale::{ScaleIngestion, SqlScaleService};
pub use session::{CookieSessionStore, SessionError, SessionOptions, SESSION_COOKIE, STATE_COOKIE};
pub use signer::Signer;
