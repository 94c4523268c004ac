//! Trigger events and per-axis score snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::AxisCode;

/// Largest value a single trigger may carry.
pub const MAX_TRIGGER_VALUE: i64 = 100;

/// A single validated axis trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvent {
    pub axis: AxisCode,
    /// Always within `1..=MAX_TRIGGER_VALUE`
    pub value: i64,
    pub source: String,
    pub metadata: serde_json::Value,
}

/// Batch handed to the ingestion service.
#[derive(Debug, Clone)]
pub struct RecordTriggers {
    pub profile_id: String,
    pub triggers: Vec<TriggerEvent>,
}

/// Accumulated score on one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisScore {
    pub value: i64,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_trigger_source: Option<String>,
}

/// Current scores for a profile.
#[derive(Debug, Clone, Default)]
pub struct ScaleSnapshot {
    pub updated_at: Option<DateTime<Utc>>,
    pub axis_scores: HashMap<AxisCode, AxisScore>,
}

/// Wire shape of one axis in `GET /efbd/summary`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisSummary {
    pub code: AxisCode,
    pub value: i64,
    pub last_updated: Option<String>,
    pub last_trigger_source: Option<String>,
}
