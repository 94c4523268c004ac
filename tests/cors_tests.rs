// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! CORS and routing fallback tests.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};

mod common;
use common::*;

#[tokio::test]
async fn test_preflight_from_allowed_origin() {
    let app = create_test_app().await;

    let response = send(
        &app.router,
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/efbd/trigger")
            .header(header::ORIGIN, "http://localhost:1313")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:1313"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
        "GET, POST, OPTIONS"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
        "Content-Type, Accept, X-Timezone"
    );
}

#[tokio::test]
async fn test_preflight_from_unknown_origin() {
    let app = create_test_app().await;

    let response = send(
        &app.router,
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/efbd/trigger")
            .header(header::ORIGIN, "https://evil.test")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_error_responses_carry_cors_headers() {
    let app = create_test_app().await;

    let response = send(
        &app.router,
        Request::builder()
            .uri("/efbd/summary")
            .header(header::ORIGIN, "https://site.test")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://site.test"
    );
    assert_eq!(response.headers().get(header::VARY).unwrap(), "Origin");
}

#[tokio::test]
async fn test_unknown_route_and_wrong_method_are_not_found() {
    let app = create_test_app().await;

    let unknown = send(
        &app.router,
        Request::builder()
            .uri("/nope")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    let json = body_json(unknown).await;
    assert_eq!(json["error"], "not_found");

    let wrong_method = send(
        &app.router,
        Request::builder()
            .method(Method::GET)
            .uri("/auth/logout")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(wrong_method.status(), StatusCode::NOT_FOUND);
}
