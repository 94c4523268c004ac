// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! CORS policy middleware.
//!
//! Only origins derived from configuration are answered with CORS
//! headers; every other caller gets the response untouched.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{Config, DEFAULT_SITE_BASE_URL};

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Accept, X-Timezone";
const MAX_AGE_SECONDS: &str = "86400";

/// Set of origins allowed to make credentialed requests.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed: HashSet<String>,
}

impl CorsPolicy {
    /// Allow the site base URL, any extra configured origins, and the
    /// default site. Unparseable entries are logged and skipped.
    pub fn from_config(config: &Config) -> Self {
        let candidates = std::iter::once(config.site_base_url.as_str())
            .chain(config.allowed_origins.iter().map(String::as_str))
            .chain(std::iter::once(DEFAULT_SITE_BASE_URL));

        let allowed = candidates
            .filter_map(|raw| {
                let origin = normalize_origin(raw);
                if origin.is_none() {
                    tracing::warn!(url = %raw, "Ignoring invalid CORS origin");
                }
                origin
            })
            .collect();

        Self { allowed }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed.contains(origin)
    }

    /// Stamp CORS headers onto `response` when `origin` is allowed.
    pub fn apply(&self, origin: Option<&str>, response: &mut Response) {
        let Some(value) = self.allowed_origin_value(origin) else {
            return;
        };

        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }

    /// 204 answer to an `OPTIONS` request.
    pub fn preflight(&self, origin: Option<&str>) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;

        if self.allowed_origin_value(origin).is_some() {
            let headers = response.headers_mut();
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOW_METHODS),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOW_HEADERS),
            );
            headers.insert(
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static(MAX_AGE_SECONDS),
            );
            self.apply(origin, &mut response);
        }

        response
    }

    fn allowed_origin_value(&self, origin: Option<&str>) -> Option<HeaderValue> {
        origin
            .filter(|origin| self.is_allowed(origin))
            .and_then(|origin| HeaderValue::from_str(origin).ok())
    }
}

/// Reduce a URL to its `scheme://host[:port]` origin.
pub fn normalize_origin(raw: &str) -> Option<String> {
    let url = reqwest::Url::parse(raw.trim()).ok()?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(origin.ascii_serialization())
}

/// Answer preflights and decorate every other response.
pub async fn apply_cors(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    if request.method() == Method::OPTIONS {
        return policy.preflight(origin.as_deref());
    }

    let mut response = next.run(request).await;
    policy.apply(origin.as_deref(), &mut response);
    response
}
