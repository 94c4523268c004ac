// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! EFBD trigger ingestion and per-profile summary routes.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    AxisCode, AxisSummary, RecordTriggers, TriggerEvent, UnknownAxis, MAX_TRIGGER_VALUE,
};
use crate::routes::{attach_cookies, no_store};
use crate::services::CookieSessionStore;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

/// Source recorded when the client names none.
pub const DEFAULT_TRIGGER_SOURCE: &str = "site";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/efbd/trigger", post(trigger))
        .route("/efbd/summary", get(summary))
}

/// Body of `POST /efbd/trigger`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerRequest {
    #[serde(default, alias = "axis")]
    axis_code: Option<String>,
    /// Number or numeric string; defaults to 1.
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
    #[serde(default)]
    context: Option<Value>,
    #[serde(default)]
    profile_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    authenticated: bool,
    profile_id: String,
    updated_at: Option<String>,
    axes: Vec<AxisSummary>,
}

/// Per-request EFBD controller.
pub struct EfbdController {
    state: Arc<AppState>,
    session: CookieSessionStore,
}

impl EfbdController {
    pub fn new(state: Arc<AppState>, jar: &CookieJar) -> Self {
        let session = CookieSessionStore::from_jar(&state.config, jar);
        Self { state, session }
    }

    /// Attach every queued cookie to `response`.
    pub fn finish(&mut self, response: Response) -> Response {
        attach_cookies(response, self.session.collect_cookies())
    }

    /// Validate and record a single axis trigger.
    pub async fn handle_trigger(&mut self, body: &[u8]) -> Result<Response> {
        let state = Arc::clone(&self.state);

        let request: TriggerRequest = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?;

        let axis: AxisCode = request
            .axis_code
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Missing axisCode".to_string()))?
            .parse()
            .map_err(|e: UnknownAxis| AppError::BadRequest(e.to_string()))?;

        let value = normalize_value(request.value.as_ref()).ok_or_else(|| {
            AppError::BadRequest("value must be a positive finite number".to_string())
        })?;

        let source = resolve_source(&request);
        let metadata = request
            .metadata
            .clone()
            .or_else(|| request.context.clone())
            .unwrap_or_else(|| Value::Object(Default::default()));

        let scale = state
            .scale
            .clone()
            .ok_or_else(|| {
                AppError::ServiceUnavailable("Scale service not configured".to_string())
            })?;

        let known_profile = match self.session.read_session(true) {
            Some(session) => Some(session.profile_id),
            None => request
                .profile_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        };
        // A freshly minted anonymous id can never be replayed, so it gets no
        // guard rows.
        let guard = state.guard.as_ref().filter(|_| known_profile.is_some());
        let profile_id =
            known_profile.unwrap_or_else(|| format!("anon-{}", Uuid::new_v4()));

        let now = Utc::now();
        if let Some(guard) = guard {
            let record = guard.enforce_cleanup_window(&profile_id, now).await?;
            if record.is_some_and(|r| r.has_completed(&source)) {
                tracing::warn!(
                    profile_id = %profile_id,
                    source = %source,
                    "Replay of completed game blocked"
                );
                return Err(AppError::ReplayBlocked);
            }
        }

        scale
            .record_triggers(&RecordTriggers {
                profile_id: profile_id.clone(),
                triggers: vec![TriggerEvent {
                    axis,
                    value,
                    source: source.clone(),
                    metadata,
                }],
            })
            .await
            .map_err(|e| AppError::Upstream(format!("Scale ingestion failed: {}", e)))?;

        if let Some(guard) = guard {
            guard.mark_completed(&profile_id, &source, now).await?;
        }

        tracing::info!(
            profile_id = %profile_id,
            axis = %axis,
            value,
            source = %source,
            "EFBD trigger recorded"
        );
        Ok(StatusCode::NO_CONTENT.into_response())
    }

    /// Current score on every axis for the session's profile.
    pub async fn handle_summary(&mut self) -> Result<Response> {
        let state = Arc::clone(&self.state);

        let session = self.session.read_session(true).ok_or(AppError::Unauthorized)?;
        let scale = state
            .scale
            .clone()
            .ok_or_else(|| {
                AppError::ServiceUnavailable("Scale service not configured".to_string())
            })?;

        let snapshot = scale
            .fetch_snapshot(&session.profile_id)
            .await
            .map_err(|e| AppError::Upstream(format!("Scale snapshot failed: {}", e)))?;

        let axes = AxisCode::ALL
            .iter()
            .map(|axis| match snapshot.axis_scores.get(axis) {
                Some(score) => AxisSummary {
                    code: *axis,
                    value: score.value,
                    last_updated: score.last_updated.map(format_utc_rfc3339),
                    last_trigger_source: score.last_trigger_source.clone(),
                },
                None => AxisSummary {
                    code: *axis,
                    value: 0,
                    last_updated: None,
                    last_trigger_source: None,
                },
            })
            .collect();

        Ok(no_store(
            Json(SummaryResponse {
                authenticated: true,
                profile_id: session.profile_id,
                updated_at: snapshot.updated_at.map(format_utc_rfc3339),
                axes,
            })
            .into_response(),
        ))
    }
}

/// Round and clamp a trigger value into `1..=MAX_TRIGGER_VALUE`. Missing
/// means 1; anything non-numeric, non-finite or not positive is rejected.
pub fn normalize_value(raw: Option<&Value>) -> Option<i64> {
    let numeric = match raw {
        None | Some(Value::Null) => return Some(1),
        Some(Value::Number(n)) => n.as_f64()?,
        Some(Value::String(s)) => s.trim().parse::<f64>().ok()?,
        Some(_) => return None,
    };

    if !numeric.is_finite() || numeric <= 0.0 {
        return None;
    }

    Some((numeric.round() as i64).clamp(1, MAX_TRIGGER_VALUE))
}

/// `source`, then `metadata.source`, then `context.source`.
fn resolve_source(request: &TriggerRequest) -> String {
    let nested = |value: &Option<Value>| {
        value
            .as_ref()
            .and_then(|v| v.get("source"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let clean = |candidate: Option<String>| {
        candidate
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    clean(request.source.clone())
        .or_else(|| clean(nested(&request.metadata)))
        .or_else(|| clean(nested(&request.context)))
        .unwrap_or_else(|| DEFAULT_TRIGGER_SOURCE.to_string())
}

// ─── Handlers ────────────────────────────────────────────────────

async fn trigger(State(state): State<Arc<AppState>>, jar: CookieJar, body: Bytes) -> Response {
    let mut controller = EfbdController::new(state, &jar);
    let response = match controller.handle_trigger(&body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    controller.finish(response)
}

async fn summary(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let mut controller = EfbdController::new(state, &jar);
    let response = match controller.handle_summary().await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    controller.finish(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value(None), Some(1));
        assert_eq!(normalize_value(Some(&Value::Null)), Some(1));
        assert_eq!(normalize_value(Some(&json!(3))), Some(3));
        assert_eq!(normalize_value(Some(&json!(2.5))), Some(3));
        assert_eq!(normalize_value(Some(&json!(0.2))), Some(1));
        assert_eq!(normalize_value(Some(&json!(1000))), Some(MAX_TRIGGER_VALUE));
        assert_eq!(normalize_value(Some(&json!("7"))), Some(7));
        assert_eq!(normalize_value(Some(&json!(0))), None);
        assert_eq!(normalize_value(Some(&json!(-4))), None);
        assert_eq!(normalize_value(Some(&json!("inf"))), None);
        assert_eq!(normalize_value(Some(&json!("lots"))), None);
        assert_eq!(normalize_value(Some(&json!(true))), None);
    }

    #[test]
    fn test_resolve_source_fallbacks() {
        let request: TriggerRequest = serde_json::from_value(json!({
            "axis": "EBF-MIND",
            "context": {"source": "mirror-game"}
        }))
        .unwrap();
        assert_eq!(request.axis_code.as_deref(), Some("EBF-MIND"));
        assert_eq!(resolve_source(&request), "mirror-game");

        let request: TriggerRequest = serde_json::from_value(json!({
            "axisCode": "EBF-MIND",
            "source": "  ",
            "metadata": {"source": "meta"},
            "context": {"source": "ctx"}
        }))
        .unwrap();
        assert_eq!(resolve_source(&request), "meta");

        assert_eq!(resolve_source(&TriggerRequest::default()), DEFAULT_TRIGGER_SOURCE);
    }
}
