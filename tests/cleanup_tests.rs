// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile cleanup and cooldown guard tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{Duration, Utc};
use interdead_auth::config::Config;
use interdead_auth::db::GuardProfileUpdate;
use interdead_auth::error::AppError;
use serde_json::json;

mod common;
use common::*;

fn cleanup(session: Option<&str>, timezone: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/auth/profile/cleanup")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = session {
        builder = builder.header(header::COOKIE, format!("interdead_session={}", token));
    }
    if let Some(tz) = timezone {
        builder = builder.header("X-Timezone", tz);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_cleanup_requires_session() {
    let app = create_test_app().await;

    let response = send(&app.router, cleanup(None, None, "")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "unauthorized");
    assert_eq!(json["authenticated"], false);
}

#[tokio::test]
async fn test_cleanup_success() {
    let app = create_test_app().await;
    let token = session_token(&app.state.config, "cleanup-1");

    app.guard
        .mark_completed("cleanup-1", "mirror-game", Utc::now())
        .await
        .unwrap();

    let response = send(
        &app.router,
        cleanup(Some(&token), Some("Europe/Berlin"), r#"{"timezone":"Asia/Tokyo"}"#),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        cookie_value(&set_cookies(&response), "interdead_session").as_deref(),
        Some("deleted")
    );

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["profileId"], "cleanup-1");
    assert_eq!(json["deleteCount"], 1);
    assert_eq!(json["timezone"], "Europe/Berlin");
    assert!(json["lastCleanupAt"].as_str().unwrap().ends_with('Z'));

    let record = app
        .guard
        .find_by_profile_id("cleanup-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.delete_count, 1);
    assert_eq!(record.timezone.as_deref(), Some("Europe/Berlin"));
    assert!(record.completed_games.is_empty());
}

#[tokio::test]
async fn test_cleanup_timezone_from_body() {
    let app = create_test_app().await;
    let token = session_token(&app.state.config, "cleanup-tz");

    let response = send(
        &app.router,
        cleanup(Some(&token), None, r#"{"timezone":"America/Chicago"}"#),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["timezone"], "America/Chicago");
}

#[tokio::test]
async fn test_third_cleanup_then_blocked() {
    let app = create_test_app().await;
    let token = session_token(&app.state.config, "cleanup-3");

    for expected in 1..=3 {
        let response = send(&app.router, cleanup(Some(&token), None, "{}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["deleteCount"], expected);
    }

    let response = send(&app.router, cleanup(Some(&token), None, "{}")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: i64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 24 * 3600);

    let trigger = send(
        &app.router,
        Request::builder()
            .method("POST")
            .uri("/efbd/trigger")
            .header(header::COOKIE, format!("interdead_session={}", token))
            .body(Body::from(json!({"axisCode": "EBF-MIND"}).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(trigger.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_failed_guard_write_keeps_session() {
    let app = create_test_app().await;
    let token = session_token(&app.state.config, "cleanup-broken");

    sqlx::query("DROP TABLE profile_completed_games")
        .execute(&app.pool)
        .await
        .unwrap();

    let response = send(&app.router, cleanup(Some(&token), None, "")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(cookie_value(&set_cookies(&response), "interdead_session").is_none());
    let json = body_json(response).await;
    assert_eq!(json["error"], "database_error");

    let guards: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM profile_guards WHERE profile_id = 'cleanup-broken'",
    )
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(guards, 0);
}

#[tokio::test]
async fn test_window_resets_after_a_day() {
    let app = create_test_app().await;
    let earlier = Utc::now() - Duration::hours(25);

    for _ in 0..3 {
        app.guard
            .record_cleanup("cleanup-old", Some("UTC"), earlier)
            .await
            .unwrap();
    }

    let record = app
        .guard
        .enforce_cleanup_window("cleanup-old", Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.delete_count, 0);

    let stored = app
        .guard
        .find_by_profile_id("cleanup-old")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.delete_count, 0);
    assert_eq!(stored.timezone.as_deref(), Some("UTC"));
}

#[tokio::test]
async fn test_two_cleanups_do_not_block() {
    let app = create_test_app().await;
    let now = Utc::now();

    for _ in 0..2 {
        app.guard.record_cleanup("cleanup-2", None, now).await.unwrap();
    }

    assert!(app
        .guard
        .enforce_cleanup_window("cleanup-2", now)
        .await
        .unwrap()
        .is_some());

    app.guard.record_cleanup("cleanup-2", None, now).await.unwrap();
    assert!(matches!(
        app.guard.enforce_cleanup_window("cleanup-2", now).await,
        Err(AppError::CleanupBlocked { .. })
    ));
}

#[tokio::test]
async fn test_guard_counters_survive_relink() {
    let app = create_test_app().await;
    let now = Utc::now();

    app.guard.record_cleanup("relinked", None, now).await.unwrap();
    app.guard
        .upsert_profile(
            &GuardProfileUpdate {
                profile_id: "relinked".to_string(),
                discord_id: Some("99".to_string()),
                discord_username: Some("user99".to_string()),
                display_name: Some("Ghost 99".to_string()),
                avatar_url: None,
            },
            now,
        )
        .await
        .unwrap();
    app.guard
        .upsert_profile(
            &GuardProfileUpdate {
                profile_id: "relinked".to_string(),
                display_name: Some("Renamed".to_string()),
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();

    let record = app.guard.find_by_discord_id("99").await.unwrap().unwrap();
    assert_eq!(record.profile_id, "relinked");
    assert_eq!(record.delete_count, 1);
    assert_eq!(record.display_name.as_deref(), Some("Renamed"));
    assert_eq!(record.discord_id.as_deref(), Some("99"));
}

#[tokio::test]
async fn test_clear_completed() {
    let app = create_test_app().await;
    let now = Utc::now();

    app.guard.mark_completed("games", "a", now).await.unwrap();
    app.guard.mark_completed("games", "b", now).await.unwrap();
    app.guard.mark_completed("games", "a", now).await.unwrap();

    let record = app.guard.find_by_profile_id("games").await.unwrap().unwrap();
    assert_eq!(record.completed_games.len(), 2);

    app.guard.clear_completed("games").await.unwrap();
    let record = app.guard.find_by_profile_id("games").await.unwrap().unwrap();
    assert!(record.completed_games.is_empty());
}

#[tokio::test]
async fn test_cleanup_without_persistence_unavailable() {
    let config = Config::test_default();
    let token = session_token(&config, "nobody");
    let app = create_offline_app(config);

    let response = send(&app, cleanup(Some(&token), None, "")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
