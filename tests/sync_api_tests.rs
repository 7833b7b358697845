// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity sync tests against a fake Strava API.
//!
//! These tests verify that:
//! 1. Synced activities are filtered and normalized before storage
//! 2. Expired and rejected Strava tokens are refreshed once
//! 3. Transient Strava failures are retried

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use tower::ServiceExt;

mod common;

use common::{
    body_json, create_test_jwt, far_future, seed_tokens, spawn_fake_strava, ATHLETE_ID,
};

async fn sync(app: &Router, query: &str) -> (StatusCode, Value) {
    let token = create_test_jwt(ATHLETE_ID);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/sync/activities{}", query))
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

fn strava_activities() -> Value {
    json!([
        {
            "id": 101,
            "name": "Morning Run",
            "sport_type": "Run",
            "type": "Run",
            "start_date": "2026-02-01T07:00:00Z",
            "distance": 10012.5,
            "moving_time": 3000,
            "total_elevation_gain": 88.0
        },
        {
            "id": 102,
            "name": "Lunch Ride",
            "sport_type": "Ride",
            "type": "Ride",
            "start_date": "2026-02-02T12:00:00Z",
            "distance": 30000.0,
            "moving_time": 4000,
            "total_elevation_gain": 200.0
        },
        {
            "id": 103,
            "name": "Old Trail Run",
            "type": "Run",
            "start_date": "2026-02-03T07:00:00+00:00",
            "distance": 8000.0,
            "moving_time": 2800
        }
    ])
}

#[tokio::test]
async fn test_sync_stores_all_activities() {
    let (fake, base) = spawn_fake_strava().await;
    fake.set_activities(strava_activities());
    let (app, state) = common::create_test_app_with_strava(&base);
    seed_tokens(&state, ATHLETE_ID, "live-token", far_future()).await;

    let (status, body) = sync(&app, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "count": 3}));

    let activity = state.db.get_activity(101).await.unwrap().unwrap();
    assert_eq!(activity.athlete_id, ATHLETE_ID);
    assert_eq!(activity.name.as_deref(), Some("Morning Run"));
    assert_eq!(activity.distance_m, Some(10012.5));
    assert_eq!(activity.moving_time_s, Some(3000));
    assert_eq!(activity.elevation_gain_m, Some(88.0));

    // Legacy `type` fills in a missing `sport_type`
    let legacy = state.db.get_activity(103).await.unwrap().unwrap();
    assert_eq!(legacy.sport_type.as_deref(), Some("Run"));
    assert_eq!(legacy.start_date.as_deref(), Some("2026-02-03T07:00:00Z"));
}

#[tokio::test]
async fn test_sync_filters() {
    let (fake, base) = spawn_fake_strava().await;
    fake.set_activities(strava_activities());
    let (app, state) = common::create_test_app_with_strava(&base);
    seed_tokens(&state, ATHLETE_ID, "live-token", far_future()).await;

    let (status, body) = sync(&app, "?sport_type=run").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert!(state.db.get_activity(102).await.unwrap().is_none());

    let (_, body) = sync(&app, "?sport_type=Run&name_contains=trail").await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_sync_without_strava_login() {
    let (_fake, base) = spawn_fake_strava().await;
    let (app, _state) = common::create_test_app_with_strava(&base);

    let (status, body) = sync(&app, "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["detail"],
        "No Strava token found. Login with Strava first."
    );
}

#[tokio::test]
async fn test_sync_refreshes_expired_token() {
    let (fake, base) = spawn_fake_strava().await;
    fake.set_activities(strava_activities());
    let (app, state) = common::create_test_app_with_strava(&base);
    seed_tokens(&state, ATHLETE_ID, "stale-token", chrono::Utc::now().timestamp() - 10).await;

    let (status, _) = sync(&app, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fake.last_bearer.lock().unwrap().as_deref(), Some("refreshed-1"));

    let tokens = state.db.get_tokens(ATHLETE_ID).await.unwrap().unwrap();
    assert_eq!(tokens.access_token, "refreshed-1");
    assert_eq!(tokens.refresh_token, "refresh-1");
    assert!(tokens.expires_at > chrono::Utc::now().timestamp());
}

#[tokio::test]
async fn test_sync_retries_once_after_unauthorized() {
    let (fake, base) = spawn_fake_strava().await;
    fake.set_activities(strava_activities());
    fake.unauthorized_remaining.store(1, Ordering::SeqCst);
    let (app, state) = common::create_test_app_with_strava(&base);
    seed_tokens(&state, ATHLETE_ID, "revoked-token", far_future()).await;

    let (status, body) = sync(&app, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(fake.api_calls.load(Ordering::SeqCst), 2);
    assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fake.last_bearer.lock().unwrap().as_deref(), Some("refreshed-1"));
}

#[tokio::test]
async fn test_sync_gives_up_after_second_unauthorized() {
    let (fake, base) = spawn_fake_strava().await;
    fake.unauthorized_remaining.store(5, Ordering::SeqCst);
    let (app, state) = common::create_test_app_with_strava(&base);
    seed_tokens(&state, ATHLETE_ID, "revoked-token", far_future()).await;

    let (status, body) = sync(&app, "").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "strava_error");
    assert_eq!(fake.api_calls.load(Ordering::SeqCst), 2);
    assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sync_retries_unavailable() {
    let (fake, base) = spawn_fake_strava().await;
    fake.set_activities(strava_activities());
    fake.unavailable_remaining.store(2, Ordering::SeqCst);
    let (app, state) = common::create_test_app_with_strava(&base);
    seed_tokens(&state, ATHLETE_ID, "live-token", far_future()).await;

    let (status, body) = sync(&app, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(fake.api_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_sync_fails_when_strava_stays_unavailable() {
    let (fake, base) = spawn_fake_strava().await;
    fake.unavailable_remaining.store(100, Ordering::SeqCst);
    let (app, state) = common::create_test_app_with_strava(&base);
    seed_tokens(&state, ATHLETE_ID, "live-token", far_future()).await;

    let (status, _) = sync(&app, "").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    // First attempt plus three retries
    assert_eq!(fake.api_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_client_get_athlete() {
    let (fake, base) = spawn_fake_strava().await;
    let (_app, state) = common::create_test_app_with_strava(&base);
    let client = livemap_coach::services::StravaClient::with_base_urls(
        state.config.strava_client_id.clone(),
        state.config.strava_client_secret.clone(),
        &state.config.strava_api_base,
        &state.config.strava_oauth_base,
    );

    let athlete = client.get_athlete("live-token").await.unwrap();
    assert_eq!(athlete.id, ATHLETE_ID);
    assert_eq!(athlete.firstname.as_deref(), Some("Ada"));
    assert_eq!(fake.last_bearer.lock().unwrap().as_deref(), Some("live-token"));

    fake.unauthorized_remaining.store(1, Ordering::SeqCst);
    let err = client.get_athlete("revoked").await.unwrap_err();
    assert_eq!(err.to_string(), "Strava API error: Invalid or expired Strava token");
}
