//! Outer error boundary: a panicking handler still yields a JSON 500.

use axum::response::{IntoResponse, Response};
use std::any::Any;

use crate::error::AppError;

/// Response used by `CatchPanicLayer::custom`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(anyhow::anyhow!("Handler panicked: {}", details)).into_response()
}
