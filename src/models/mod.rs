// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod axis;
pub mod profile;
pub mod scale;
pub mod session;

pub use axis::{AxisCode, UnknownAxis};
pub use profile::{DiscordLink, ProfileAggregate, ProfileGuardRecord, ProfileMetadata};
pub use scale::{
    AxisScore, AxisSummary, RecordTriggers, ScaleSnapshot, TriggerEvent, MAX_TRIGGER_VALUE,
};
pub use session::{OAuthStatePayload, SessionPayload, SessionProfile};
