// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::services::session::SessionError;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Invalid OAuth state")]
    InvalidState,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found")]
    NotFound,

    #[error("Trigger source already completed")]
    ReplayBlocked,

    #[error("Profile is cooling down after repeated cleanups")]
    CleanupBlocked { retry_after_secs: i64 },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    /// Only present on 401 so the site can tell "logged out" from "broken".
    #[serde(skip_serializing_if = "Option::is_none")]
    authenticated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

impl ErrorResponse {
    fn new(error: &str, details: Option<String>) -> Self {
        Self {
            error: error.to_string(),
            details,
            authenticated: None,
            reason: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("bad_request", Some(msg.clone())),
            ),
            AppError::InvalidState => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("invalid_state", Some("Invalid OAuth state".to_string())),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    authenticated: Some(false),
                    reason: Some("unauthorized"),
                    ..ErrorResponse::new("unauthorized", None)
                },
            ),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("not_found", None),
            ),
            AppError::ReplayBlocked => (
                StatusCode::CONFLICT,
                ErrorResponse::new(
                    "replay_blocked",
                    Some("This mini-game has already been completed".to_string()),
                ),
            ),
            AppError::CleanupBlocked { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorResponse::new(
                    "cleanup_blocked",
                    Some("Too many profile cleanups, try again later".to_string()),
                ),
            ),
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Upstream dependency failed");
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse::new("upstream_error", None),
                )
            }
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new("service_unavailable", Some(msg.clone())),
            ),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("database_error", None),
                )
            }
            AppError::Session(err) => {
                tracing::error!(error = %err, "Session token error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("internal_error", Some("Internal server error".to_string())),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("internal_error", Some("Internal server error".to_string())),
                )
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let AppError::CleanupBlocked { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
